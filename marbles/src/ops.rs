use crate::{error::MarblesError, random};
use marbles_client::{LedgerClient, LedgerTransport};
use marbles_core::{
    BatchResult, ClearMarblesResponse, Marble, Owner, Response, Transfer, LEDGER_KEY_BATCH_RESULTS,
    MARBLES_PROCEDURE_ID, MARBLE_ID_PREFIX, OWNER_ID_PREFIX,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info};

/// The marbles procedures, called through a [`LedgerClient`] on one channel.
pub struct Marbles<T> {
    client: Arc<LedgerClient<T>>,
    channel_id: String,
    procedure_id: String,
}

impl<T> Clone for Marbles<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            channel_id: self.channel_id.clone(),
            procedure_id: self.procedure_id.clone(),
        }
    }
}

impl<T: LedgerTransport> Marbles<T> {
    /// Marbles on the client's consortium channel.
    pub fn new(client: Arc<LedgerClient<T>>) -> Self {
        let channel_id = client.consortium_channel_id().to_string();
        Self::with_ids(client, &channel_id, MARBLES_PROCEDURE_ID)
    }

    pub fn with_ids(client: Arc<LedgerClient<T>>, channel_id: &str, procedure_id: &str) -> Self {
        Self {
            client,
            channel_id: channel_id.to_string(),
            procedure_id: procedure_id.to_string(),
        }
    }

    pub fn client(&self) -> &Arc<LedgerClient<T>> {
        &self.client
    }

    /// Creates `owner`, generating an id when it has none.
    pub async fn create_owner(&self, owner: &Owner) -> Result<Response, MarblesError> {
        let id = if owner.id.is_empty() {
            random::entity_id(OWNER_ID_PREFIX)
        } else {
            owner.id.clone()
        };

        let args = [
            "init_owner",
            id.as_str(),
            owner.username.as_str(),
            owner.company.as_str(),
        ];
        let tx_id = self.invoke(&args).await?;
        Ok(Response {
            id,
            tx_id,
            error: None,
        })
    }

    pub async fn get_owner(&self, id: &str) -> Result<Option<Owner>, MarblesError> {
        self.read_entity(id).await
    }

    /// Creates `marble` on behalf of its owner, generating an id when it has none.
    pub async fn create_marble(&self, marble: &Marble) -> Result<Response, MarblesError> {
        let id = if marble.id.is_empty() {
            random::entity_id(MARBLE_ID_PREFIX)
        } else {
            marble.id.clone()
        };

        let size = marble.size.to_string();
        let mut args = vec![
            "init_marble",
            id.as_str(),
            marble.color.as_str(),
            size.as_str(),
            marble.owner.id.as_str(),
            marble.owner.company.as_str(),
        ];
        if let Some(extra) = marble.additional_data.as_deref().filter(|d| !d.is_empty()) {
            args.push(extra);
        }

        let tx_id = self.invoke(&args).await?;
        Ok(Response {
            id,
            tx_id,
            error: None,
        })
    }

    pub async fn get_marble(&self, id: &str) -> Result<Option<Marble>, MarblesError> {
        self.read_entity(id).await
    }

    pub async fn transfer(&self, transfer: &Transfer) -> Result<Response, MarblesError> {
        let args = [
            "set_owner",
            transfer.marble_id.as_str(),
            transfer.to_owner_id.as_str(),
            transfer.auth_company.as_str(),
        ];
        let tx_id = self.invoke(&args).await?;
        Ok(Response {
            id: transfer.marble_id.clone(),
            tx_id,
            error: None,
        })
    }

    pub async fn delete_marble(
        &self,
        id: &str,
        auth_company: &str,
    ) -> Result<Response, MarblesError> {
        let tx_id = self.invoke(&["delete_marble", id, auth_company]).await?;
        Ok(Response {
            id: id.to_string(),
            tx_id,
            error: None,
        })
    }

    /// Removes every marble from the ledger.
    pub async fn clear_marbles(&self) -> Result<ClearMarblesResponse, MarblesError> {
        let reply = self
            .client
            .invoke(&self.channel_id, &self.procedure_id, &["clear_marbles"], None)
            .await?;

        let mut response: ClearMarblesResponse = serde_json::from_slice(&reply.payload)?;
        response.tx_id = reply.tx_id;
        Ok(response)
    }

    pub async fn write_key(&self, key: &str, value: &str) -> Result<String, MarblesError> {
        self.invoke(&["write", key, value]).await
    }

    /// Value stored under `key`, `None` when the key is absent.
    pub async fn read_key(
        &self,
        key: &str,
        max_attempts: u32,
    ) -> Result<Option<Vec<u8>>, MarblesError> {
        let reply = self
            .client
            .query(
                max_attempts,
                &self.channel_id,
                &self.procedure_id,
                &["read", key],
                None,
                None,
            )
            .await?;

        Ok(Some(reply.payload).filter(|p| !p.is_empty()))
    }

    pub async fn store_batch_result(
        &self,
        batch_id: &str,
        result: &BatchResult,
    ) -> Result<(), MarblesError> {
        let key = batch_result_key(batch_id);
        let json = serde_json::to_string_pretty(result)?;
        let tx_id = self.write_key(&key, &json).await?;
        info!("Stored result of batch {batch_id} under {key} ({tx_id})");
        Ok(())
    }

    /// Persisted result of `batch_id`; `None` while the run is still going.
    pub async fn fetch_batch_result(
        &self,
        batch_id: &str,
    ) -> Result<Option<BatchResult>, MarblesError> {
        match self.read_key(&batch_result_key(batch_id), 1).await? {
            Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
            None => Ok(None),
        }
    }

    async fn invoke(&self, args: &[&str]) -> Result<String, MarblesError> {
        let reply = self
            .client
            .invoke(&self.channel_id, &self.procedure_id, args, None)
            .await?;
        debug!("{} -> {}", args[0], reply.tx_id);
        Ok(reply.tx_id)
    }

    async fn read_entity<E: DeserializeOwned>(&self, id: &str) -> Result<Option<E>, MarblesError> {
        match self.read_key(id, 0).await? {
            Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
            None => Ok(None),
        }
    }
}

pub fn batch_result_key(batch_id: &str) -> String {
    format!("{batch_id}{LEDGER_KEY_BATCH_RESULTS}")
}
