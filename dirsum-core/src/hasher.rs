use crate::algorithm::Algorithm;
use crate::error::{Error, Result};
use cbc_mac::{CbcMac, Mac};
use des::TdesEde3;
use sha2::Digest;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

const READ_BUF: usize = 64 * 1024;

/// Fixed key for the legacy MAC. Digests are only comparable if every producer uses the same key.
const LEGACY_MAC_KEY: &[u8; 24] = b"dirsum-legacy-mac-key-24";

/// Incremental state for one of the supported algorithms.
enum State {
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
    MacTripleDes(Box<CbcMac<TdesEde3>>),
    Md5(md5::Md5),
    Ripemd160(ripemd::Ripemd160),
}

impl State {
    fn new(alg: Algorithm) -> Self {
        match alg {
            Algorithm::Sha1 => State::Sha1(sha1::Sha1::new()),
            Algorithm::Sha256 => State::Sha256(sha2::Sha256::new()),
            Algorithm::Sha384 => State::Sha384(sha2::Sha384::new()),
            Algorithm::Sha512 => State::Sha512(sha2::Sha512::new()),
            Algorithm::MacTripleDes => {
                let mac = <CbcMac<TdesEde3> as Mac>::new(LEGACY_MAC_KEY.into());
                State::MacTripleDes(Box::new(mac))
            }
            Algorithm::Md5 => State::Md5(md5::Md5::new()),
            Algorithm::Ripemd160 => State::Ripemd160(ripemd::Ripemd160::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            State::Sha1(h) => Digest::update(h, data),
            State::Sha256(h) => Digest::update(h, data),
            State::Sha384(h) => Digest::update(h, data),
            State::Sha512(h) => Digest::update(h, data),
            State::MacTripleDes(m) => Mac::update(m.as_mut(), data),
            State::Md5(h) => Digest::update(h, data),
            State::Ripemd160(h) => Digest::update(h, data),
        }
    }

    fn finish_hex(self) -> String {
        match self {
            State::Sha1(h) => hex::encode(h.finalize()),
            State::Sha256(h) => hex::encode(h.finalize()),
            State::Sha384(h) => hex::encode(h.finalize()),
            State::Sha512(h) => hex::encode(h.finalize()),
            State::MacTripleDes(m) => hex::encode((*m).finalize().into_bytes()),
            State::Md5(h) => hex::encode(h.finalize()),
            State::Ripemd160(h) => hex::encode(h.finalize()),
        }
    }
}

/// Lowercase hex digest of everything `reader` yields.
pub fn digest_reader<R: Read>(mut reader: R, alg: Algorithm) -> std::io::Result<String> {
    let mut state = State::new(alg);
    let mut buf = vec![0u8; READ_BUF];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        state.update(&buf[..n]);
    }
    Ok(state.finish_hex())
}

pub fn digest_bytes(data: &[u8], alg: Algorithm) -> String {
    let mut state = State::new(alg);
    state.update(data);
    state.finish_hex()
}

/// Hash a file's full content. The handle is closed before returning.
pub fn digest(path: &Path, alg: Algorithm) -> Result<String> {
    let f = File::open(path).map_err(|e| Error::io(path, e))?;
    digest_reader(f, alg).map_err(|e| Error::io(path, e))
}
