//! Guardian signatures. Guardians sign [`Digest::secp256k_hash`](crate::vaa::Digest) with
//! recoverable ECDSA over secp256k1, and a VAA is authoritative once more than two thirds of the
//! guardian set it names have signed it.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use log::debug;
use secp256k1::{
    ecdsa::{RecoverableSignature as EcdsaSignature, RecoveryId},
    Message, PublicKey, SecretKey, SECP256K1,
};
use serde::{Deserialize, Serialize};
use sha3::Digest as Sha3Digest;

use crate::{
    require,
    vaa::{Signature, Vaa},
    GuardianAddress, GuardianSetInfo, VaaError, WirePayload,
};

/// A guardian signing key.
#[derive(Clone, PartialEq, Eq)]
pub struct GuardianKey(SecretKey);

impl GuardianKey {
    pub fn from_bytes(b: &[u8]) -> Result<Self, VaaError> {
        Ok(GuardianKey(SecretKey::from_slice(b)?))
    }

    /// Accepts an optional `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, VaaError> {
        let b = hex::decode(s.trim().trim_start_matches("0x"))?;
        GuardianKey::from_bytes(&b)
    }

    /// A fresh key, for devnets and tests.
    pub fn random() -> Self {
        loop {
            let b: [u8; 32] = rand::random();
            if let Ok(sk) = SecretKey::from_slice(&b) {
                return GuardianKey(sk);
            }
        }
    }

    /// The last 20 bytes of the Keccak256 hash of the uncompressed public key, without its
    /// leading tag byte.
    pub fn address(&self) -> GuardianAddress {
        address_of(&PublicKey::from_secret_key_global(&self.0))
    }

    pub fn sign(&self, digest: &[u8; 32]) -> RecoverableSignature {
        sign(self, digest)
    }
}

// Never print the secret.
impl fmt::Debug for GuardianKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GuardianKey").field(&self.address()).finish()
    }
}

fn address_of(pk: &PublicKey) -> GuardianAddress {
    let uncompressed = pk.serialize_uncompressed();
    let hash = sha3::Keccak256::digest(&uncompressed[1..]);

    let mut a = [0u8; 20];
    a.copy_from_slice(&hash[12..]);
    GuardianAddress(a)
}

/// An ECDSA signature with the id needed to recover the signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecoverableSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// 0 or 1.
    pub recovery_id: u8,
}

impl RecoverableSignature {
    /// The 65 byte wire form: `r || s || recovery_id`.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut b = [0u8; 65];
        b[..32].copy_from_slice(&self.r);
        b[32..64].copy_from_slice(&self.s);
        b[64] = self.recovery_id;
        b
    }

    /// Parses the wire form. Ethereum style recovery ids (27, 28) are accepted.
    pub fn from_bytes(b: &[u8; 65]) -> Result<Self, VaaError> {
        let recovery_id = match b[64] {
            id @ 0..=3 => id,
            id @ 27..=30 => id - 27,
            id => return Err(VaaError::InvalidRecoveryId(id)),
        };

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&b[..32]);
        s.copy_from_slice(&b[32..64]);

        Ok(RecoverableSignature { r, s, recovery_id })
    }
}

/// Signs `digest` as is. The digest is expected to already be the double hash of a VAA body; no
/// further hashing happens here.
pub fn sign(key: &GuardianKey, digest: &[u8; 32]) -> RecoverableSignature {
    let msg = Message::from_digest(*digest);
    let (id, compact) = SECP256K1
        .sign_ecdsa_recoverable(&msg, &key.0)
        .serialize_compact();

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&compact[..32]);
    s.copy_from_slice(&compact[32..]);

    RecoverableSignature {
        r,
        s,
        recovery_id: id.to_i32() as u8,
    }
}

/// Recovers the address of the guardian that produced `signature` over `digest`.
pub fn recover(signature: &[u8; 65], digest: &[u8; 32]) -> Result<GuardianAddress, VaaError> {
    let sig = RecoverableSignature::from_bytes(signature)?;
    let id = RecoveryId::from_i32(i32::from(sig.recovery_id))?;
    let sig = EcdsaSignature::from_compact(&signature[..64], id)?;

    let pk = SECP256K1.recover_ecdsa(&Message::from_digest(*digest), &sig)?;
    Ok(address_of(&pk))
}

impl<P> Vaa<P> {
    /// Appends a signature without checking it. The caller is responsible for `index` matching
    /// the signer's position in the guardian set; [`verify_quorum`] checks it.
    pub fn add_signature(&mut self, index: u8, signature: RecoverableSignature) {
        self.signatures.push(Signature {
            index,
            signature: signature.to_bytes(),
        });
    }
}

impl<P: WirePayload> Vaa<P> {
    /// Signs the VAA digest with `key` as the guardian at `index`.
    pub fn sign(&mut self, index: u8, key: &GuardianKey) -> Result<(), VaaError> {
        let digest = self.digest()?;
        self.add_signature(index, key.sign(&digest.secp256k_hash));
        Ok(())
    }
}

/// Counts the distinct guardians of `guardian_set` that validly signed `vaa` and fails with
/// `QuorumNotMet` when they are not enough.
///
/// Signatures with an index outside the set, that do not recover, that recover to a different
/// guardian or that repeat an index already counted are discarded.
pub fn verify_quorum<P: WirePayload>(
    vaa: &Vaa<P>,
    guardian_set: &GuardianSetInfo,
) -> Result<usize, VaaError> {
    let digest = vaa.digest()?;

    let mut signers = BTreeSet::new();
    for sig in &vaa.signatures {
        let Some(expected) = guardian_set.addresses.get(usize::from(sig.index)) else {
            debug!("discarding signature with out-of-range guardian index {}", sig.index);
            continue;
        };

        match recover(&sig.signature, &digest.secp256k_hash) {
            Ok(signer) if signer == *expected => {
                if !signers.insert(sig.index) {
                    debug!("discarding duplicate signature from guardian {}", sig.index);
                }
            }
            Ok(signer) => debug!(
                "discarding signature at index {}: recovered {signer}, expected {expected}",
                sig.index
            ),
            Err(e) => debug!("discarding signature at index {}: {e}", sig.index),
        }
    }

    let valid = signers.len();
    let required = guardian_set.quorum();
    require!(valid >= required, VaaError::QuorumNotMet { valid, required });

    Ok(valid)
}

/// Read-only map of guardian set index to guardian set. Refreshing it is the owner's business.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct GuardianSetTable {
    sets: BTreeMap<u32, GuardianSetInfo>,
}

impl GuardianSetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: u32, set: GuardianSetInfo) -> Option<GuardianSetInfo> {
        self.sets.insert(index, set)
    }

    pub fn get(&self, index: u32) -> Option<&GuardianSetInfo> {
        self.sets.get(&index)
    }

    /// Verifies `vaa` against the guardian set it names, as of `now` (UNIX seconds).
    pub fn verify<P: WirePayload>(&self, vaa: &Vaa<P>, now: u64) -> Result<usize, VaaError> {
        let index = vaa.guardian_set_index;
        let set = self
            .get(index)
            .ok_or(VaaError::UnknownGuardianSet(index))?;

        require!(
            set.expiration_time == 0 || set.expiration_time >= now,
            VaaError::GuardianSetExpired(index)
        );

        verify_quorum(vaa, set)
    }
}

impl FromIterator<(u32, GuardianSetInfo)> for GuardianSetTable {
    fn from_iter<I: IntoIterator<Item = (u32, GuardianSetInfo)>>(iter: I) -> Self {
        GuardianSetTable {
            sets: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{vaa::VaaBuilder, Address, Chain};

    fn keys(n: usize) -> Vec<GuardianKey> {
        (1..=n)
            .map(|i| GuardianKey::from_bytes(&[i as u8; 32]).unwrap())
            .collect()
    }

    fn guardian_set(keys: &[GuardianKey]) -> GuardianSetInfo {
        GuardianSetInfo {
            addresses: keys.iter().map(GuardianKey::address).collect(),
            expiration_time: 0,
        }
    }

    fn unsigned() -> Vaa {
        VaaBuilder::new(Chain::Solana, Address([0xec; 32]))
            .timestamp(1_700_000_000)
            .nonce(7)
            .sequence(42)
            .build(b"hello".to_vec())
    }

    #[test]
    fn known_addresses() {
        let one = GuardianKey::from_hex(
            "0x0000000000000000000000000000000000000000000000000000000000000001",
        )
        .unwrap();
        assert_eq!(
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf",
            one.address().to_string()
        );

        let devnet = GuardianKey::from_hex(
            "cfb12303a19cde580bb4dd771639b0d26bc68353645571a8cff516ab2ee113a0",
        )
        .unwrap();
        assert_eq!(
            "0xbefa429d57cd18b7f8a4d91a2da9ab4af05d0fbe",
            devnet.address().to_string()
        );
    }

    #[test]
    fn invalid_keys() {
        assert!(matches!(
            GuardianKey::from_bytes(&[0u8; 32]),
            Err(VaaError::InvalidSignature(_))
        ));
        assert!(matches!(GuardianKey::from_hex("xyz"), Err(VaaError::Hex(_))));
    }

    #[test]
    fn sign_and_recover() {
        let key = GuardianKey::random();
        let digest = unsigned().digest().unwrap().secp256k_hash;

        let sig = sign(&key, &digest);
        assert!(sig.recovery_id <= 1);
        assert_eq!(key.address(), recover(&sig.to_bytes(), &digest).unwrap());

        let mut eth_style = sig.to_bytes();
        eth_style[64] += 27;
        assert_eq!(key.address(), recover(&eth_style, &digest).unwrap());

        let mut bad = sig.to_bytes();
        bad[64] = 5;
        assert!(matches!(
            recover(&bad, &digest),
            Err(VaaError::InvalidRecoveryId(5))
        ));
    }

    #[test]
    fn quorum_thresholds() {
        for (n, threshold) in [(1, 1), (3, 3), (19, 13)] {
            let keys = keys(n);
            let set = guardian_set(&keys);
            assert_eq!(threshold, set.quorum());

            for signed in 0..=n {
                let mut vaa = unsigned();
                for (i, k) in keys.iter().enumerate().take(signed) {
                    vaa.sign(i as u8, k).unwrap();
                }

                let res = verify_quorum(&vaa, &set);
                if signed >= threshold {
                    assert_eq!(signed, res.unwrap(), "n = {n}, signed = {signed}");
                } else {
                    assert!(
                        matches!(
                            res,
                            Err(VaaError::QuorumNotMet { valid, required })
                                if valid == signed && required == threshold
                        ),
                        "n = {n}, signed = {signed}"
                    );
                }
            }
        }
    }

    #[test]
    fn duplicate_signers_count_once() {
        let keys = keys(3);
        let set = guardian_set(&keys);

        let mut vaa = unsigned();
        vaa.sign(0, &keys[0]).unwrap();
        vaa.sign(0, &keys[0]).unwrap();
        vaa.sign(1, &keys[1]).unwrap();
        vaa.sign(1, &keys[1]).unwrap();

        assert!(matches!(
            verify_quorum(&vaa, &set),
            Err(VaaError::QuorumNotMet {
                valid: 2,
                required: 3
            })
        ));

        vaa.sign(2, &keys[2]).unwrap();
        assert_eq!(3, verify_quorum(&vaa, &set).unwrap());
    }

    #[test]
    fn wrong_signers_do_not_count() {
        let keys = keys(3);
        let set = guardian_set(&keys);
        let outsider = GuardianKey::from_bytes(&[0x77; 32]).unwrap();

        let mut vaa = unsigned();
        vaa.sign(0, &keys[0]).unwrap();
        vaa.sign(1, &keys[1]).unwrap();
        // Signed by an outsider claiming a guardian's position.
        vaa.sign(2, &outsider).unwrap();
        // Right key, wrong position.
        vaa.sign(2, &keys[0]).unwrap();
        // Index outside the set.
        vaa.sign(9, &keys[2]).unwrap();
        // Garbage.
        vaa.signatures.push(Signature {
            index: 2,
            signature: [0xff; 65],
        });

        assert!(matches!(
            verify_quorum(&vaa, &set),
            Err(VaaError::QuorumNotMet {
                valid: 2,
                required: 3
            })
        ));
    }

    #[test]
    fn signatures_cover_the_body() {
        let keys = keys(1);
        let set = guardian_set(&keys);

        let mut vaa = unsigned();
        vaa.sign(0, &keys[0]).unwrap();
        assert_eq!(1, verify_quorum(&vaa, &set).unwrap());

        vaa.sequence += 1;
        assert!(verify_quorum(&vaa, &set).is_err());
    }

    #[test]
    fn signed_vaa_survives_the_wire() {
        let keys = keys(3);
        let set = guardian_set(&keys);

        let mut vaa = unsigned();
        for i in [2usize, 0, 1] {
            vaa.sign(i as u8, &keys[i]).unwrap();
        }

        let parsed = Vaa::<Vec<u8>>::deserialize(&vaa.serialize().unwrap()).unwrap();
        assert_eq!(
            vec![0, 1, 2],
            parsed.signatures.iter().map(|s| s.index).collect::<Vec<_>>()
        );
        assert_eq!(3, verify_quorum(&parsed, &set).unwrap());
    }

    #[test]
    fn guardian_set_table() {
        let keys = keys(1);
        let mut set = guardian_set(&keys);

        let mut vaa = unsigned();
        vaa.sign(0, &keys[0]).unwrap();

        let table: GuardianSetTable = [(0, set.clone())].into_iter().collect();
        assert_eq!(1, table.verify(&vaa, 1_700_000_000).unwrap());

        vaa.guardian_set_index = 1;
        assert!(matches!(
            table.verify(&vaa, 1_700_000_000),
            Err(VaaError::UnknownGuardianSet(1))
        ));

        set.expiration_time = 100;
        let mut table = GuardianSetTable::new();
        assert!(table.insert(1, set).is_none());
        assert!(table.verify(&vaa, 100).is_ok());
        assert!(matches!(
            table.verify(&vaa, 101),
            Err(VaaError::GuardianSetExpired(1))
        ));
    }
}
