use crate::{
    FaucetError,
    Result,
    address::{
        Address,
        base32_encode,
        sha512_256,
    },
};
use base64::{
    Engine,
    engine::general_purpose::STANDARD,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_bytes::ByteBuf;
use std::fmt;

const TXID_PREFIX: &[u8] = b"TX";
const GROUP_PREFIX: &[u8] = b"TG";

#[derive(Clone, PartialEq, Eq, Default)]
pub struct Blob(pub Vec<u8>);

impl Blob {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for Blob {
    fn from(bytes: &[u8]) -> Self {
        Blob(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Blob(bytes)
    }
}

impl From<&str> for Blob {
    fn from(text: &str) -> Self {
        Blob(text.as_bytes().to_vec())
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) if text.chars().all(|c| !c.is_control()) => write!(f, "{text:?}"),
            _ => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub [u8; 32]);

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({})", hex::encode(self.0))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxId(pub [u8; 32]);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base32_encode(&self.0))
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({self})")
    }
}

/// Storage box attached to an application call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoxRef {
    pub app_id: u64,
    pub name: Blob,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxnKind {
    Pay { receiver: Address, amount: u64 },
    /// NoOp application call.
    Appl {
        app_id: u64,
        args: Vec<Blob>,
        boxes: Vec<BoxRef>,
    },
}

/// Fields shared by every member of a group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxnHeader {
    pub sender: Address,
    pub fee: u64,
    pub first_valid: u64,
    pub last_valid: u64,
    pub genesis_id: String,
    /// Base64, as the node reports it.
    pub genesis_hash: String,
    pub note: Blob,
    pub group: Option<GroupId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub header: TxnHeader,
    pub kind: TxnKind,
}

impl Transaction {
    pub fn sender(&self) -> &Address {
        &self.header.sender
    }

    pub fn fee(&self) -> u64 {
        self.header.fee
    }

    pub fn group(&self) -> Option<GroupId> {
        self.header.group
    }

    pub fn app_args(&self) -> &[Blob] {
        match &self.kind {
            TxnKind::Appl { args, .. } => args,
            TxnKind::Pay { .. } => &[],
        }
    }

    pub fn app_id(&self) -> Option<u64> {
        match &self.kind {
            TxnKind::Appl { app_id, .. } => Some(*app_id),
            TxnKind::Pay { .. } => None,
        }
    }

    /// Canonical msgpack: short field names, sorted keys, empty values left out.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(&WireTxn::try_from(self)?)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let wire: WireTxn = rmp_serde::from_slice(bytes)
            .map_err(|e| FaucetError::Decode(format!("transaction: {e}")))?;
        wire.try_into()
    }

    pub fn id(&self) -> Result<TxId> {
        let encoded = self.encode()?;
        Ok(TxId(sha512_256(&[TXID_PREFIX, &encoded])))
    }
}

/// Hashes the ids of the members, each taken with its group field cleared.
pub fn compute_group_id(txns: &[Transaction]) -> Result<GroupId> {
    let mut ids = Vec::with_capacity(txns.len() * 32);
    for txn in txns {
        let mut bare = txn.clone();
        bare.header.group = None;
        ids.extend_from_slice(&bare.id()?.0);
    }
    Ok(GroupId(sha512_256(&[GROUP_PREFIX, &ids])))
}

pub fn assign_group_id(txns: &mut [Transaction]) -> Result<GroupId> {
    let group = compute_group_id(txns)?;
    for txn in txns.iter_mut() {
        txn.header.group = Some(group);
    }
    Ok(group)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogicSig {
    pub program: Blob,
}

/// A transaction authorized by a program instead of a key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogicSigTransaction {
    pub lsig: LogicSig,
    pub txn: Transaction,
}

impl LogicSigTransaction {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let wire = WireSigned {
            lsig: WireLogicSig {
                l: self.lsig.program.0.clone(),
            },
            txn: WireTxn::try_from(&self.txn)?,
        };
        Ok(rmp_serde::to_vec_named(&wire)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let wire: WireSigned = rmp_serde::from_slice(bytes)
            .map_err(|e| FaucetError::Decode(format!("signed transaction: {e}")))?;
        Ok(LogicSigTransaction {
            lsig: LogicSig {
                program: Blob(wire.lsig.l),
            },
            txn: wire.txn.try_into()?,
        })
    }
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

// Field order is the sorted key order the chain hashes over.
#[derive(Serialize, Deserialize, Default)]
struct WireTxn {
    #[serde(default, skip_serializing_if = "is_zero")]
    amt: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    apaa: Vec<ByteBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    apbx: Vec<WireBoxRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    apfa: Vec<u64>,
    #[serde(default, skip_serializing_if = "is_zero")]
    apid: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    fee: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    fv: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    r#gen: String,
    #[serde(default, with = "serde_bytes", skip_serializing_if = "Vec::is_empty")]
    gh: Vec<u8>,
    #[serde(default, with = "serde_bytes", skip_serializing_if = "Option::is_none")]
    grp: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "is_zero")]
    lv: u64,
    #[serde(default, with = "serde_bytes", skip_serializing_if = "Vec::is_empty")]
    note: Vec<u8>,
    #[serde(default, with = "serde_bytes", skip_serializing_if = "Option::is_none")]
    rcv: Option<Vec<u8>>,
    #[serde(default, with = "serde_bytes", skip_serializing_if = "Vec::is_empty")]
    snd: Vec<u8>,
    #[serde(rename = "type")]
    kind: String,
}

/// `i` is 0 for the called application, otherwise a 1-based slot in `apfa`.
#[derive(Serialize, Deserialize)]
struct WireBoxRef {
    #[serde(default, skip_serializing_if = "is_zero")]
    i: u64,
    #[serde(default, with = "serde_bytes", skip_serializing_if = "Vec::is_empty")]
    n: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct WireLogicSig {
    #[serde(with = "serde_bytes")]
    l: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct WireSigned {
    lsig: WireLogicSig,
    txn: WireTxn,
}

fn wire_address(address: &Address) -> Option<Vec<u8>> {
    (!address.is_zero()).then(|| address.public_key().to_vec())
}

fn address_from_wire(field: &str, bytes: Option<Vec<u8>>) -> Result<Address> {
    match bytes {
        None => Ok(Address::zero()),
        Some(bytes) => <[u8; 32]>::try_from(bytes.as_slice())
            .map(Address::new)
            .map_err(|_| FaucetError::Decode(format!("{field}: expected 32 bytes"))),
    }
}

impl TryFrom<&Transaction> for WireTxn {
    type Error = FaucetError;

    fn try_from(txn: &Transaction) -> Result<Self> {
        let header = &txn.header;
        let gh = STANDARD
            .decode(&header.genesis_hash)
            .map_err(|e| FaucetError::Decode(format!("genesis hash: {e}")))?;
        let mut wire = WireTxn {
            fee: header.fee,
            fv: header.first_valid,
            r#gen: header.genesis_id.clone(),
            gh,
            grp: header.group.map(|g| g.0.to_vec()),
            lv: header.last_valid,
            note: header.note.0.clone(),
            snd: wire_address(&header.sender).unwrap_or_default(),
            ..WireTxn::default()
        };
        match &txn.kind {
            TxnKind::Pay { receiver, amount } => {
                wire.kind = "pay".to_owned();
                wire.amt = *amount;
                wire.rcv = wire_address(receiver);
            }
            TxnKind::Appl {
                app_id,
                args,
                boxes,
            } => {
                wire.kind = "appl".to_owned();
                wire.apid = *app_id;
                wire.apaa = args.iter().map(|a| ByteBuf::from(a.0.clone())).collect();
                for b in boxes {
                    let i = if b.app_id == *app_id {
                        0
                    } else {
                        let slot = match wire.apfa.iter().position(|id| *id == b.app_id) {
                            Some(slot) => slot,
                            None => {
                                wire.apfa.push(b.app_id);
                                wire.apfa.len() - 1
                            }
                        };
                        slot as u64 + 1
                    };
                    wire.apbx.push(WireBoxRef {
                        i,
                        n: b.name.0.clone(),
                    });
                }
            }
        }
        Ok(wire)
    }
}

impl TryFrom<WireTxn> for Transaction {
    type Error = FaucetError;

    fn try_from(wire: WireTxn) -> Result<Self> {
        let group = match wire.grp {
            None => None,
            Some(bytes) => Some(GroupId(
                <[u8; 32]>::try_from(bytes.as_slice())
                    .map_err(|_| FaucetError::Decode("grp: expected 32 bytes".into()))?,
            )),
        };
        let header = TxnHeader {
            sender: address_from_wire("snd", Some(wire.snd).filter(|s| !s.is_empty()))?,
            fee: wire.fee,
            first_valid: wire.fv,
            last_valid: wire.lv,
            genesis_id: wire.r#gen,
            genesis_hash: STANDARD.encode(&wire.gh),
            note: Blob(wire.note),
            group,
        };
        let kind = match wire.kind.as_str() {
            "pay" => TxnKind::Pay {
                receiver: address_from_wire("rcv", wire.rcv)?,
                amount: wire.amt,
            },
            "appl" => {
                let mut boxes = Vec::with_capacity(wire.apbx.len());
                for b in wire.apbx {
                    let app_id = match b.i {
                        0 => wire.apid,
                        i => *wire.apfa.get(i as usize - 1).ok_or_else(|| {
                            FaucetError::Decode(format!("apbx: no foreign app at slot {i}"))
                        })?,
                    };
                    boxes.push(BoxRef {
                        app_id,
                        name: Blob(b.n),
                    });
                }
                TxnKind::Appl {
                    app_id: wire.apid,
                    args: wire.apaa.into_iter().map(|a| Blob(a.into_vec())).collect(),
                    boxes,
                }
            }
            other => return Err(FaucetError::Decode(format!("unsupported type {other:?}"))),
        };
        Ok(Transaction { header, kind })
    }
}
