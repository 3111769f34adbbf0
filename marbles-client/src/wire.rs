//! JSON bodies of the ledger's HTTP protocol. Byte arrays travel hex encoded.
use crate::{
    error::ClientError,
    transport::{LedgerEvent, LedgerResponse, Request},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequest {
    pub procedure_id: String,
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub transient: HashMap<String, String>,
    #[serde(default)]
    pub endorsers: Vec<String>,
}

impl WireRequest {
    pub fn new(request: &Request, endorsers: Vec<String>) -> Self {
        Self {
            procedure_id: request.procedure_id.clone(),
            function: request.function.clone(),
            args: request.args.iter().map(hex::encode).collect(),
            transient: request
                .transient
                .iter()
                .map(|(k, v)| (k.clone(), hex::encode(v)))
                .collect(),
            endorsers,
        }
    }

    pub fn decode(&self) -> Result<Request, ClientError> {
        Ok(Request {
            procedure_id: self.procedure_id.clone(),
            function: self.function.clone(),
            args: self
                .args
                .iter()
                .map(hex::decode)
                .collect::<Result<_, _>>()?,
            transient: self
                .transient
                .iter()
                .map(|(k, v)| -> Result<_, ClientError> { Ok((k.clone(), hex::decode(v)?)) })
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResponse {
    pub status: i32,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub tx_id: String,
}

impl From<&LedgerResponse> for WireResponse {
    fn from(res: &LedgerResponse) -> Self {
        Self {
            status: res.status,
            payload: hex::encode(&res.payload),
            message: res.message.clone(),
            tx_id: res.tx_id.clone(),
        }
    }
}

impl TryFrom<WireResponse> for LedgerResponse {
    type Error = ClientError;

    fn try_from(res: WireResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            status: res.status,
            payload: hex::decode(&res.payload)?,
            message: res.message,
            tx_id: res.tx_id,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent {
    pub tx_id: String,
    pub procedure_id: String,
    pub event_id: String,
    #[serde(default)]
    pub payload: String,
}

impl WireEvent {
    pub fn new(tx_id: &str, procedure_id: &str, event_id: &str, payload: &[u8]) -> Self {
        Self {
            tx_id: tx_id.to_string(),
            procedure_id: procedure_id.to_string(),
            event_id: event_id.to_string(),
            payload: hex::encode(payload),
        }
    }

    /// Event as received from the replica at `source_url`.
    pub fn into_event(self, source_url: &str) -> Result<LedgerEvent, ClientError> {
        Ok(LedgerEvent {
            payload: hex::decode(&self.payload)?,
            tx_id: self.tx_id,
            procedure_id: self.procedure_id,
            event_id: self.event_id,
            source_url: source_url.to_string(),
        })
    }
}
