//! Builds a tiny but valid SoundFont 2 in memory.
//!
//! Every preset points at one instrument playing one looped sine sample, which
//! is enough for preset lookup and audible rendering in tests.

const SAMPLE_LEN: usize = 1000;
/// SF2 requires 46 zero samples after each sample.
const SAMPLE_PAD: usize = 46;

fn chunk(id: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 9);
    out.extend_from_slice(id);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    if data.len() % 2 == 1 {
        out.push(0);
    }
    out
}

fn list(kind: &[u8; 4], chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut body = kind.to_vec();
    for c in chunks {
        body.extend_from_slice(c);
    }
    chunk(b"LIST", &body)
}

fn name20(name: &str) -> [u8; 20] {
    let mut out = [0u8; 20];
    let bytes = name.as_bytes();
    let n = bytes.len().min(19);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

fn u16le(v: u16) -> [u8; 2] {
    v.to_le_bytes()
}

fn u32le(v: u32) -> [u8; 4] {
    v.to_le_bytes()
}

/// `presets` is `(bank, program, name)`.
pub fn build_sf2(presets: &[(u16, u16, &str)]) -> Vec<u8> {
    let info = list(
        b"INFO",
        &[
            chunk(b"ifil", &[2, 0, 1, 0]),
            chunk(b"isng", b"EMU8000\0"),
            chunk(b"INAM", b"tiny\0\0"),
        ],
    );

    let mut smpl = Vec::with_capacity((SAMPLE_LEN + SAMPLE_PAD) * 2);
    for i in 0..SAMPLE_LEN {
        // 100 samples per cycle keeps the loop seamless
        let phase = i as f64 / 100.0 * std::f64::consts::TAU;
        let value = (phase.sin() * 16000.0) as i16;
        smpl.extend_from_slice(&value.to_le_bytes());
    }
    smpl.resize(smpl.len() + SAMPLE_PAD * 2, 0);
    let sdta = list(b"sdta", &[chunk(b"smpl", &smpl)]);

    let count = presets.len() as u16;

    let mut phdr = Vec::new();
    for (i, (bank, program, name)) in presets.iter().enumerate() {
        phdr.extend_from_slice(&name20(name));
        phdr.extend_from_slice(&u16le(*program));
        phdr.extend_from_slice(&u16le(*bank));
        phdr.extend_from_slice(&u16le(i as u16));
        phdr.extend_from_slice(&[0u8; 12]);
    }
    phdr.extend_from_slice(&name20("EOP"));
    phdr.extend_from_slice(&u16le(0));
    phdr.extend_from_slice(&u16le(0));
    phdr.extend_from_slice(&u16le(count));
    phdr.extend_from_slice(&[0u8; 12]);

    let mut pbag = Vec::new();
    for i in 0..=count {
        pbag.extend_from_slice(&u16le(i));
        pbag.extend_from_slice(&u16le(0));
    }

    let mut pgen = Vec::new();
    for _ in 0..count {
        // instrument 0
        pgen.extend_from_slice(&u16le(41));
        pgen.extend_from_slice(&u16le(0));
    }
    pgen.extend_from_slice(&[0u8; 4]);

    let mut inst = Vec::new();
    inst.extend_from_slice(&name20("sine"));
    inst.extend_from_slice(&u16le(0));
    inst.extend_from_slice(&name20("EOI"));
    inst.extend_from_slice(&u16le(1));

    let mut ibag = Vec::new();
    ibag.extend_from_slice(&u16le(0));
    ibag.extend_from_slice(&u16le(0));
    ibag.extend_from_slice(&u16le(2));
    ibag.extend_from_slice(&u16le(0));

    let mut igen = Vec::new();
    // sampleModes = loop continuously, then sampleID = 0
    igen.extend_from_slice(&u16le(54));
    igen.extend_from_slice(&u16le(1));
    igen.extend_from_slice(&u16le(53));
    igen.extend_from_slice(&u16le(0));
    igen.extend_from_slice(&[0u8; 4]);

    let mut shdr = Vec::new();
    shdr.extend_from_slice(&name20("sine"));
    shdr.extend_from_slice(&u32le(0));
    shdr.extend_from_slice(&u32le(SAMPLE_LEN as u32));
    shdr.extend_from_slice(&u32le(100));
    shdr.extend_from_slice(&u32le(900));
    shdr.extend_from_slice(&u32le(44100));
    shdr.push(60);
    shdr.push(0);
    shdr.extend_from_slice(&u16le(0));
    shdr.extend_from_slice(&u16le(1));
    shdr.extend_from_slice(&name20("EOS"));
    shdr.extend_from_slice(&[0u8; 26]);

    let pdta = list(
        b"pdta",
        &[
            chunk(b"phdr", &phdr),
            chunk(b"pbag", &pbag),
            chunk(b"pmod", &[0u8; 10]),
            chunk(b"pgen", &pgen),
            chunk(b"inst", &inst),
            chunk(b"ibag", &ibag),
            chunk(b"imod", &[0u8; 10]),
            chunk(b"igen", &igen),
            chunk(b"shdr", &shdr),
        ],
    );

    let mut body = b"sfbk".to_vec();
    body.extend_from_slice(&info);
    body.extend_from_slice(&sdta);
    body.extend_from_slice(&pdta);
    chunk(b"RIFF", &body)
}

/// Write a SoundFont with the given presets into `dir`.
pub fn write_sf2(dir: &std::path::Path, presets: &[(u16, u16, &str)]) -> std::path::PathBuf {
    let path = dir.join("tiny.sf2");
    std::fs::write(&path, build_sf2(presets)).unwrap();
    path
}
