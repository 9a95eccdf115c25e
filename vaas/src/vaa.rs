//! VAA's represent a collection of signatures combined with a message and its metadata. VAA's are
//! used as a form of proof; by submitting a VAA to a target contract, the receiving contract can
//! make assumptions about the validity of state on the source chain.
//!
//! Wire layout, all integers big-endian:
//!
//! ```markdown
//! header: version u8 | guardian_set_index u32 | len_signatures u8 | (index u8, signature [65])*
//! body:   timestamp u32 | nonce u32 | emitter_chain u16 | emitter_address [32] | sequence u64
//!         | consistency_level u8 | payload (rest of the buffer)
//! ```

use std::{
    io::{Cursor, Read},
    time::{SystemTime, UNIX_EPOCH},
};

use byteorder::{BigEndian, ReadBytesExt};
use sha3::Digest as Sha3Digest;

use crate::{
    payload::{read_rest, Payload, PayloadKind},
    require,
    token::ReservedBytes,
    Address, Chain, VaaError, WirePayload, GOVERNANCE_EMITTER,
};

/// The only VAA version in use.
pub const VERSION: u8 = 1;

/// Fixed width portion of the body, everything before the payload.
pub const BODY_FIXED_LEN: usize = 4 + 4 + 2 + 32 + 8 + 1;

/// Signatures are typical ECDSA signatures prefixed with a Guardian position. These have the
/// following byte layout:
/// ```markdown
/// 0  .. 64: Signature   (ECDSA)
/// 64 .. 65: Recovery ID (ECDSA)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature {
    pub index: u8,
    pub signature: [u8; 65],
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            index: 0,
            signature: [0; 65],
        }
    }
}

/// The core VAA itself. This structure is what is received by a contract on the receiving side of
/// a message passing flow. The generic parameter `P` is the payload; raw bytes unless the caller
/// decodes it into one of the typed payloads.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Vaa<P = Vec<u8>> {
    pub version: u8,
    pub guardian_set_index: u32,
    pub signatures: Vec<Signature>,
    pub timestamp: u32,
    pub nonce: u32,
    pub emitter_chain: Chain,
    pub emitter_address: Address,
    pub sequence: u64,
    pub consistency_level: u8,
    pub payload: P,
}

/// The header for a VAA.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Header {
    pub version: u8,
    pub guardian_set_index: u32,
    pub signatures: Vec<Signature>,
}

/// The body for a VAA. This is the part guardians sign.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Body<P = Vec<u8>> {
    /// Seconds since UNIX epoch.
    pub timestamp: u32,
    pub nonce: u32,
    pub emitter_chain: Chain,
    pub emitter_address: Address,
    pub sequence: u64,
    pub consistency_level: u8,
    pub payload: P,
}

/// Digest data for the Body.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest {
    /// Keccak256 of the serialized body. Identifies the VAA everywhere, including replay
    /// protection on the receiving chains.
    pub hash: [u8; 32],

    /// Keccak256 of `hash`. This is what guardians sign and what `ecrecover` style recovery
    /// expects.
    pub secp256k_hash: [u8; 32],
}

/// Calculates the digest of an already serialized body.
pub fn digest(body: &[u8]) -> Digest {
    let hash: [u8; 32] = sha3::Keccak256::digest(body).into();
    let secp256k_hash: [u8; 32] = sha3::Keccak256::digest(hash).into();

    Digest {
        hash,
        secp256k_hash,
    }
}

fn write_body_fields(
    buf: &mut Vec<u8>,
    timestamp: u32,
    nonce: u32,
    emitter_chain: Chain,
    emitter_address: &Address,
    sequence: u64,
    consistency_level: u8,
) {
    buf.extend_from_slice(&timestamp.to_be_bytes());
    buf.extend_from_slice(&nonce.to_be_bytes());
    buf.extend_from_slice(&u16::from(emitter_chain).to_be_bytes());
    buf.extend_from_slice(&emitter_address.0);
    buf.extend_from_slice(&sequence.to_be_bytes());
    buf.push(consistency_level);
}

impl<P> Vaa<P> {
    /// Check if the VAA is a Governance VAA.
    pub fn is_governance(&self) -> bool {
        self.emitter_address == GOVERNANCE_EMITTER && self.emitter_chain == Chain::Solana
    }

    /// Replace the payload of the VAA.
    pub fn with_payload<U>(self, p: U) -> Vaa<U> {
        let (header, body): (Header, Body<P>) = self.into();
        (header, body.with_payload(p)).into()
    }
}

impl<P: WirePayload> Vaa<P> {
    /// The canonical body bytes, the preimage of [`Digest::hash`].
    pub fn body(&self) -> Result<Vec<u8>, VaaError> {
        let mut buf = Vec::with_capacity(BODY_FIXED_LEN);
        write_body_fields(
            &mut buf,
            self.timestamp,
            self.nonce,
            self.emitter_chain,
            &self.emitter_address,
            self.sequence,
            self.consistency_level,
        );
        self.payload.encode(&mut buf)?;
        Ok(buf)
    }

    pub fn digest(&self) -> Result<Digest, VaaError> {
        self.body().map(|b| digest(&b))
    }

    /// Serializes the VAA. Signatures are written in ascending guardian index order regardless of
    /// the order they were added in. Two signatures for the same guardian index are refused.
    pub fn serialize(&self) -> Result<Vec<u8>, VaaError> {
        require!(
            self.signatures.len() <= usize::from(u8::MAX),
            VaaError::TooManySignatures(self.signatures.len())
        );

        let mut signatures = self.signatures.clone();
        signatures.sort_by_key(|s| s.index);
        if let Some(w) = signatures.windows(2).find(|w| w[0].index == w[1].index) {
            return Err(VaaError::DuplicateGuardianIndex(w[0].index));
        }

        let mut buf = Vec::with_capacity(6 + 66 * signatures.len() + BODY_FIXED_LEN);
        buf.push(self.version);
        buf.extend_from_slice(&self.guardian_set_index.to_be_bytes());
        buf.push(signatures.len() as u8);
        for s in &signatures {
            buf.push(s.index);
            buf.extend_from_slice(&s.signature);
        }

        buf.extend_from_slice(&self.body()?);
        Ok(buf)
    }

    /// Parses a serialized VAA. Signatures are kept in wire order; a guardian index that appears
    /// twice is refused.
    pub fn deserialize(buf: &[u8]) -> Result<Self, VaaError> {
        let mut rdr = Cursor::new(buf);

        let version = rdr.read_u8().map_err(VaaError::truncated("version"))?;
        require!(version == VERSION, VaaError::UnsupportedVersion(version));

        let guardian_set_index = rdr
            .read_u32::<BigEndian>()
            .map_err(VaaError::truncated("guardian set index"))?;
        let len_signatures = rdr
            .read_u8()
            .map_err(VaaError::truncated("signature count"))?;

        let mut signatures = Vec::with_capacity(usize::from(len_signatures));
        for _ in 0..len_signatures {
            let index = rdr
                .read_u8()
                .map_err(VaaError::truncated("guardian index"))?;
            let mut signature = [0u8; 65];
            rdr.read_exact(&mut signature)
                .map_err(VaaError::truncated("signature"))?;
            require!(
                signatures.iter().all(|s: &Signature| s.index != index),
                VaaError::DuplicateGuardianIndex(index)
            );
            signatures.push(Signature { index, signature });
        }

        let body = Body::<Vec<u8>>::read(&mut rdr)?;
        let payload = P::decode(&body.payload)?;

        Ok((
            Header {
                version,
                guardian_set_index,
                signatures,
            },
            body.with_payload(payload),
        )
            .into())
    }

    pub fn to_hex(&self) -> Result<String, VaaError> {
        self.serialize().map(hex::encode)
    }

    /// Accepts an optional `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, VaaError> {
        let buf = hex::decode(s.trim().trim_start_matches("0x"))?;
        Vaa::deserialize(&buf)
    }

    /// Base64, as expected by the `submit_vaa` message of CosmWasm contracts.
    pub fn to_base64(&self) -> Result<String, VaaError> {
        self.serialize().map(base64::encode)
    }

    pub fn from_base64(s: &str) -> Result<Self, VaaError> {
        let buf = base64::decode(s.trim())?;
        Vaa::deserialize(&buf)
    }
}

impl Vaa<Payload> {
    /// Parses a serialized VAA and decodes its payload against `kind`, failing with
    /// `UnknownPayloadType` when the payload has a different shape.
    pub fn deserialize_as(
        buf: &[u8],
        kind: PayloadKind,
        reserved: ReservedBytes,
    ) -> Result<Self, VaaError> {
        let raw = Vaa::<Vec<u8>>::deserialize(buf)?;
        let payload = Payload::decode_as(kind, &raw.payload, reserved)?;
        Ok(raw.with_payload(payload))
    }
}

impl<P> From<Vaa<P>> for (Header, Body<P>) {
    fn from(v: Vaa<P>) -> Self {
        (
            Header {
                version: v.version,
                guardian_set_index: v.guardian_set_index,
                signatures: v.signatures,
            },
            Body {
                timestamp: v.timestamp,
                nonce: v.nonce,
                emitter_chain: v.emitter_chain,
                emitter_address: v.emitter_address,
                sequence: v.sequence,
                consistency_level: v.consistency_level,
                payload: v.payload,
            },
        )
    }
}

impl<P> From<(Header, Body<P>)> for Vaa<P> {
    fn from((hdr, body): (Header, Body<P>)) -> Self {
        Vaa {
            version: hdr.version,
            guardian_set_index: hdr.guardian_set_index,
            signatures: hdr.signatures,
            timestamp: body.timestamp,
            nonce: body.nonce,
            emitter_chain: body.emitter_chain,
            emitter_address: body.emitter_address,
            sequence: body.sequence,
            consistency_level: body.consistency_level,
            payload: body.payload,
        }
    }
}

impl<P> Body<P> {
    /// Replace the payload of the body. Useful when parsing the payload needs to be delayed.
    pub fn with_payload<U>(self, p: U) -> Body<U> {
        Body {
            timestamp: self.timestamp,
            nonce: self.nonce,
            emitter_chain: self.emitter_chain,
            emitter_address: self.emitter_address,
            sequence: self.sequence,
            consistency_level: self.consistency_level,
            payload: p,
        }
    }
}

impl Body<Vec<u8>> {
    fn read(rdr: &mut Cursor<&[u8]>) -> Result<Self, VaaError> {
        let timestamp = rdr
            .read_u32::<BigEndian>()
            .map_err(VaaError::truncated("timestamp"))?;
        let nonce = rdr
            .read_u32::<BigEndian>()
            .map_err(VaaError::truncated("nonce"))?;
        let emitter_chain = rdr
            .read_u16::<BigEndian>()
            .map_err(VaaError::truncated("emitter chain"))?;
        let mut emitter_address = [0u8; 32];
        rdr.read_exact(&mut emitter_address)
            .map_err(VaaError::truncated("emitter address"))?;
        let sequence = rdr
            .read_u64::<BigEndian>()
            .map_err(VaaError::truncated("sequence"))?;
        let consistency_level = rdr
            .read_u8()
            .map_err(VaaError::truncated("consistency level"))?;

        Ok(Body {
            timestamp,
            nonce,
            emitter_chain: emitter_chain.into(),
            emitter_address: Address(emitter_address),
            sequence,
            consistency_level,
            payload: read_rest(rdr),
        })
    }
}

impl<P: WirePayload> Body<P> {
    pub fn to_vec(&self) -> Result<Vec<u8>, VaaError> {
        let mut buf = Vec::with_capacity(BODY_FIXED_LEN);
        write_body_fields(
            &mut buf,
            self.timestamp,
            self.nonce,
            self.emitter_chain,
            &self.emitter_address,
            self.sequence,
            self.consistency_level,
        );
        self.payload.encode(&mut buf)?;
        Ok(buf)
    }

    /// Parses a serialized body, for example one observed before guardians signed it.
    pub fn deserialize(buf: &[u8]) -> Result<Self, VaaError> {
        let body = Body::<Vec<u8>>::read(&mut Cursor::new(buf))?;
        let payload = P::decode(&body.payload)?;
        Ok(body.with_payload(payload))
    }

    /// Body Digest Components. See [`Digest`].
    pub fn digest(&self) -> Result<Digest, VaaError> {
        self.to_vec().map(|b| digest(&b))
    }
}

enum SequenceSource {
    Random,
    Fixed(u64),
}

/// Builds unsigned VAAs the way local tooling and tests need them: version 1, the current time,
/// a random nonce and, unless told otherwise, a random sequence.
pub struct VaaBuilder {
    guardian_set_index: u32,
    emitter_chain: Chain,
    emitter_address: Address,
    consistency_level: u8,
    timestamp: Option<u32>,
    nonce: Option<u32>,
    sequence: SequenceSource,
}

impl VaaBuilder {
    pub fn new(emitter_chain: Chain, emitter_address: Address) -> Self {
        VaaBuilder {
            guardian_set_index: 0,
            emitter_chain,
            emitter_address,
            consistency_level: 0,
            timestamp: None,
            nonce: None,
            sequence: SequenceSource::Random,
        }
    }

    /// Emitted by the governance emitter on Solana.
    pub fn governance() -> Self {
        VaaBuilder::new(Chain::Solana, GOVERNANCE_EMITTER)
    }

    pub fn guardian_set_index(mut self, index: u32) -> Self {
        self.guardian_set_index = index;
        self
    }

    pub fn consistency_level(mut self, level: u8) -> Self {
        self.consistency_level = level;
        self
    }

    pub fn timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn nonce(mut self, nonce: u32) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn sequence(mut self, sequence: u64) -> Self {
        self.sequence = SequenceSource::Fixed(sequence);
        self
    }

    /// Uses the sequence following `previous`.
    pub fn after(self, previous: u64) -> Self {
        self.sequence(previous.saturating_add(1))
    }

    pub fn build<P>(self, payload: P) -> Vaa<P> {
        let timestamp = self.timestamp.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as u32)
                .unwrap_or_default()
        });

        Vaa {
            version: VERSION,
            guardian_set_index: self.guardian_set_index,
            signatures: Vec::new(),
            timestamp,
            nonce: self.nonce.unwrap_or_else(rand::random),
            emitter_chain: self.emitter_chain,
            emitter_address: self.emitter_address,
            sequence: match self.sequence {
                SequenceSource::Random => rand::random(),
                SequenceSource::Fixed(s) => s,
            },
            consistency_level: self.consistency_level,
            payload,
        }
    }
}
