//! Module to generate arbitrary bitcoin values for testing.

use bitcoin::{
    absolute::LockTime,
    hashes::Hash,
    key::rand::{rngs::OsRng, Rng},
    secp256k1::{schnorr::Signature, Keypair, Secp256k1, SecretKey, XOnlyPublicKey},
    transaction::Version,
    Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};

/// Generates a random transaction ID.
pub fn generate_txid() -> Txid {
    let mut txid = [0u8; 32];
    OsRng.fill(&mut txid);

    Txid::from_slice(&txid).expect("should be able to generate arbitrary txid")
}

/// Generates a random outpoint.
pub fn generate_outpoint() -> OutPoint {
    OutPoint {
        txid: generate_txid(),
        vout: OsRng.gen(),
    }
}

/// Generates a random transaction with the given number of inputs and outputs.
pub fn generate_tx(num_inputs: usize, num_outputs: usize) -> Transaction {
    let inputs = (0..num_inputs)
        .map(|_| TxIn {
            previous_output: generate_outpoint(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence(0),
            witness: Witness::new(),
        })
        .collect();

    let outputs = (0..num_outputs)
        .map(|_| {
            let value: u32 = OsRng.gen();

            TxOut {
                value: Amount::from_sat(u64::from(value)),
                script_pubkey: ScriptBuf::new(),
            }
        })
        .collect();

    Transaction {
        version: Version(2),
        lock_time: LockTime::from_consensus(0),
        input: inputs,
        output: outputs,
    }
}

/// Generates a random signature.
///
/// The signature is well-formed but does not commit to any message.
pub fn generate_signature() -> Signature {
    let mut sig = [0u8; 64];
    OsRng.fill(&mut sig);

    Signature::from_slice(&sig).expect("should be able to generate arbitrary signature")
}

/// Generates a random keypair.
pub fn generate_keypair() -> Keypair {
    let secp = Secp256k1::new();
    let sk = SecretKey::new(&mut OsRng);

    Keypair::from_secret_key(&secp, &sk)
}

/// Generates a random x-only public key.
pub fn generate_xonly_pubkey() -> XOnlyPublicKey {
    generate_keypair().x_only_public_key().0
}

/// Generates `count` distinct x-only public keys.
pub fn generate_xonly_pubkeys(count: usize) -> Vec<XOnlyPublicKey> {
    let mut keys: Vec<XOnlyPublicKey> = Vec::with_capacity(count);

    while keys.len() < count {
        let key = generate_xonly_pubkey();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    keys
}
