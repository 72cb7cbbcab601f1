//! This module contains the types used to interact with the SQLite database at a column-level.
//!
//! These types are used to map the custom Rust types to SQLite types by implementing the necessary
//! serialization and deserialization logic.

use std::{ops::Deref, str::FromStr};

use bitcoin::{
    consensus, secp256k1::schnorr::Signature, Amount, Transaction, Txid, XOnlyPublicKey,
};
use sqlx::{sqlite::SqliteValueRef, Sqlite};
use staking_primitives::state::{DelegationState, DelegationSubState, SlashedOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct DbTxid(Txid);

impl Deref for DbTxid {
    type Target = Txid;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Txid> for DbTxid {
    fn from(value: Txid) -> Self {
        Self(value)
    }
}

// Stored as displayed by block explorers. `TEXT` ordering matches the ordering of `TimeLockMarker`.
impl sqlx::Type<Sqlite> for DbTxid {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, Sqlite> for DbTxid {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let txid_hex: String = sqlx::decode::Decode::<'r, Sqlite>::decode(value)?;
        let txid = Txid::from_str(&txid_hex)
            .map_err(|_| sqlx::Error::Decode("Failed to decode Txid".into()))?;

        Ok(DbTxid(txid))
    }
}

impl<'q> sqlx::Encode<'q, Sqlite> for DbTxid {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let txid_hex = self.0.to_string();

        sqlx::Encode::<'q, Sqlite>::encode_by_ref(&txid_hex, buf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct DbTransaction(Transaction);

impl DbTransaction {
    pub(super) fn into_inner(self) -> Transaction {
        self.0
    }
}

impl From<Transaction> for DbTransaction {
    fn from(value: Transaction) -> Self {
        Self(value)
    }
}

// Stored as the hex of the consensus encoding, the format nodes relay raw transactions in.
impl sqlx::Type<Sqlite> for DbTransaction {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, Sqlite> for DbTransaction {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let tx_hex: String = sqlx::decode::Decode::<'r, Sqlite>::decode(value)?;
        let tx = consensus::encode::deserialize_hex(&tx_hex)
            .map_err(|_| sqlx::Error::Decode("Failed to decode Transaction".into()))?;

        Ok(DbTransaction(tx))
    }
}

impl<'q> sqlx::Encode<'q, Sqlite> for DbTransaction {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let tx_hex = consensus::encode::serialize_hex(&self.0);

        sqlx::Encode::<'q, Sqlite>::encode_by_ref(&tx_hex, buf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct DbXOnlyPublicKey(XOnlyPublicKey);

impl Deref for DbXOnlyPublicKey {
    type Target = XOnlyPublicKey;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<XOnlyPublicKey> for DbXOnlyPublicKey {
    fn from(value: XOnlyPublicKey) -> Self {
        Self(value)
    }
}

impl sqlx::Type<Sqlite> for DbXOnlyPublicKey {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, Sqlite> for DbXOnlyPublicKey {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let pk_str: String = sqlx::decode::Decode::<'r, Sqlite>::decode(value)?;
        let pk = XOnlyPublicKey::from_str(&pk_str)
            .map_err(|_| sqlx::Error::Decode("Failed to decode XOnlyPublicKey".into()))?;

        Ok(DbXOnlyPublicKey(pk))
    }
}

impl<'q> sqlx::Encode<'q, Sqlite> for DbXOnlyPublicKey {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let pk_str = self.0.to_string();

        sqlx::Encode::<'q, Sqlite>::encode_by_ref(&pk_str, buf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct DbSignature(Signature);

impl Deref for DbSignature {
    type Target = Signature;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Signature> for DbSignature {
    fn from(value: Signature) -> Self {
        Self(value)
    }
}

impl sqlx::Type<Sqlite> for DbSignature {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, Sqlite> for DbSignature {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let signature_str: String = sqlx::decode::Decode::<'r, Sqlite>::decode(value)?;
        let signature = Signature::from_str(&signature_str)
            .map_err(|_| sqlx::Error::Decode("Failed to decode schnorr::Signature".into()))?;

        Ok(DbSignature(signature))
    }
}

impl<'q> sqlx::Encode<'q, Sqlite> for DbSignature {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let signature_str = self.0.to_string();

        sqlx::Encode::<'q, Sqlite>::encode_by_ref(&signature_str, buf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct DbAmount(Amount);

impl Deref for DbAmount {
    type Target = Amount;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Amount> for DbAmount {
    fn from(value: Amount) -> Self {
        Self(value)
    }
}

impl sqlx::Type<Sqlite> for DbAmount {
    fn type_info() -> <Sqlite as sqlx::Database>::TypeInfo {
        <i64 as sqlx::Type<Sqlite>>::type_info()
    }
}

impl sqlx::Decode<'_, Sqlite> for DbAmount {
    fn decode(value: SqliteValueRef<'_>) -> Result<Self, sqlx::error::BoxDynError> {
        let satoshis: i64 = sqlx::decode::Decode::<'_, Sqlite>::decode(value)?;
        let amount = Amount::from_sat(satoshis as u64);

        Ok(Self(amount))
    }
}

impl sqlx::Encode<'_, Sqlite> for DbAmount {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as sqlx::Database>::ArgumentBuffer<'_>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let satoshis = self.0.to_sat() as i64;

        sqlx::Encode::<'_, Sqlite>::encode_by_ref(&satoshis, buf)
    }
}

/// Block heights are stored as `INTEGER` (i.e. `i64`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct DbHeight(u64);

impl Deref for DbHeight {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<u64> for DbHeight {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl sqlx::Type<Sqlite> for DbHeight {
    fn type_info() -> <Sqlite as sqlx::Database>::TypeInfo {
        <i64 as sqlx::Type<Sqlite>>::type_info()
    }
}

impl sqlx::Decode<'_, Sqlite> for DbHeight {
    fn decode(value: SqliteValueRef<'_>) -> Result<Self, sqlx::error::BoxDynError> {
        let height: i64 = sqlx::decode::Decode::<'_, Sqlite>::decode(value)?;
        let height = u64::try_from(height)
            .map_err(|_| sqlx::Error::Decode("Failed to decode negative height".into()))?;

        Ok(Self(height))
    }
}

impl sqlx::Encode<'_, Sqlite> for DbHeight {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as sqlx::Database>::ArgumentBuffer<'_>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let height = self.0 as i64;

        sqlx::Encode::<'_, Sqlite>::encode_by_ref(&height, buf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct DbDelegationState(DelegationState);

impl Deref for DbDelegationState {
    type Target = DelegationState;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<DelegationState> for DbDelegationState {
    fn from(value: DelegationState) -> Self {
        Self(value)
    }
}

impl sqlx::Type<Sqlite> for DbDelegationState {
    fn type_info() -> <Sqlite as sqlx::Database>::TypeInfo {
        <String as sqlx::Type<Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, Sqlite> for DbDelegationState {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let state_str: String = sqlx::decode::Decode::<'r, Sqlite>::decode(value)?;
        let state = DelegationState::from_str(&state_str)?;

        Ok(Self(state))
    }
}

impl<'q> sqlx::Encode<'q, Sqlite> for DbDelegationState {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let state_str = self.0.as_str().to_string();

        sqlx::Encode::<'q, Sqlite>::encode_by_ref(&state_str, buf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct DbSubState(DelegationSubState);

impl Deref for DbSubState {
    type Target = DelegationSubState;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<DelegationSubState> for DbSubState {
    fn from(value: DelegationSubState) -> Self {
        Self(value)
    }
}

impl sqlx::Type<Sqlite> for DbSubState {
    fn type_info() -> <Sqlite as sqlx::Database>::TypeInfo {
        <String as sqlx::Type<Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, Sqlite> for DbSubState {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let sub_state_str: String = sqlx::decode::Decode::<'r, Sqlite>::decode(value)?;
        let sub_state = DelegationSubState::from_str(&sub_state_str)?;

        Ok(Self(sub_state))
    }
}

impl<'q> sqlx::Encode<'q, Sqlite> for DbSubState {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let sub_state_str = self.0.as_str().to_string();

        sqlx::Encode::<'q, Sqlite>::encode_by_ref(&sub_state_str, buf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct DbSlashedOutput(SlashedOutput);

impl Deref for DbSlashedOutput {
    type Target = SlashedOutput;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<SlashedOutput> for DbSlashedOutput {
    fn from(value: SlashedOutput) -> Self {
        Self(value)
    }
}

impl sqlx::Type<Sqlite> for DbSlashedOutput {
    fn type_info() -> <Sqlite as sqlx::Database>::TypeInfo {
        <String as sqlx::Type<Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, Sqlite> for DbSlashedOutput {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let output_str: String = sqlx::decode::Decode::<'r, Sqlite>::decode(value)?;
        let output = SlashedOutput::from_str(&output_str)?;

        Ok(Self(output))
    }
}

impl<'q> sqlx::Encode<'q, Sqlite> for DbSlashedOutput {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let output_str = self.0.as_str().to_string();

        sqlx::Encode::<'q, Sqlite>::encode_by_ref(&output_str, buf)
    }
}
