use crate::adapters::auth::CredentialAuth;
use crate::core::graphql_client::GraphQLPaginationClient;
use crate::core::rest_client::RestPaginationClient;
use crate::domain::model::{ProtocolType, Source};
use crate::domain::ports::{AuthApplier, PaginationClient};
use crate::utils::error::Result;
use reqwest::Client;
use std::sync::Arc;

/// 依來源宣告的協定選擇客戶端；未知協定直接報錯，不做預設
#[derive(Clone)]
pub struct ClientFactory {
    rest: Arc<RestPaginationClient>,
    graphql: Arc<GraphQLPaginationClient>,
}

impl ClientFactory {
    pub fn new(client: Client, auth: Arc<dyn AuthApplier>) -> Self {
        Self {
            rest: Arc::new(RestPaginationClient::new(client.clone(), auth.clone())),
            graphql: Arc::new(GraphQLPaginationClient::new(client, auth)),
        }
    }

    pub fn with_default_auth() -> Self {
        Self::new(Client::new(), Arc::new(CredentialAuth))
    }

    pub fn client(&self, protocol: ProtocolType) -> Arc<dyn PaginationClient> {
        match protocol {
            ProtocolType::Rest => self.rest.clone() as Arc<dyn PaginationClient>,
            ProtocolType::GraphQL => self.graphql.clone() as Arc<dyn PaginationClient>,
        }
    }

    /// `"REST"` 或 `"GRAPHQL"`，不分大小寫
    pub fn client_for(&self, protocol_type: &str) -> Result<Arc<dyn PaginationClient>> {
        let protocol: ProtocolType = protocol_type.parse()?;
        Ok(self.client(protocol))
    }

    pub fn client_for_source(&self, source: &Source) -> Result<Arc<dyn PaginationClient>> {
        self.client_for(&source.protocol_type)
    }
}

impl Default for ClientFactory {
    fn default() -> Self {
        Self::with_default_auth()
    }
}
