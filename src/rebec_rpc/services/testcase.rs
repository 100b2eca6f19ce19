//! `testcase.v1.TestcaseService`: record, list and delete test case results.

use crate::client::{CallOptions, ClientBuilder, MethodHandle, RpcClient};
use crate::descriptor::builtin::TESTCASE_SERVICE;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateTestcaseRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub experiment: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub package: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub classname: String,
    #[serde(rename = "error", default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub level: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
}

impl CreateTestcaseRequest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTestcaseResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTestcasesRequest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub experiment: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestcaseItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub classname: String,
    #[serde(default)]
    pub experiment_id: String,
    #[serde(default)]
    pub tags: Option<Map<String, Value>>,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: i32,
    #[serde(default)]
    pub execution_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListTestcasesResponse {
    #[serde(default)]
    pub items: Vec<TestcaseItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteTestcaseRequest {
    pub id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteTestcaseResponse {
    #[serde(default, deserialize_with = "super::int64")]
    pub deleted: i64,
}

#[derive(Debug, Clone)]
pub struct TestcaseServiceClient {
    create: MethodHandle,
    list: MethodHandle,
    delete: MethodHandle,
}

impl TestcaseServiceClient {
    pub fn new(client: &RpcClient) -> Result<Self> {
        Ok(Self {
            create: client.method("Create")?,
            list: client.method("List")?,
            delete: client.method("Delete")?,
        })
    }

    pub fn connect(builder: ClientBuilder) -> Result<Self> {
        Self::new(&builder.service(TESTCASE_SERVICE).build()?)
    }

    pub async fn create(
        &self,
        request: &CreateTestcaseRequest,
        options: CallOptions,
    ) -> Result<CreateTestcaseResponse> {
        self.create.invoke_as(request, options).await
    }

    pub async fn list(
        &self,
        request: &ListTestcasesRequest,
        options: CallOptions,
    ) -> Result<ListTestcasesResponse> {
        self.list.invoke_as(request, options).await
    }

    pub async fn delete(&self, id: &str, options: CallOptions) -> Result<DeleteTestcaseResponse> {
        let request = DeleteTestcaseRequest { id: id.to_string() };
        self.delete.invoke_as(&request, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_request_uses_wire_names() {
        let mut req = CreateTestcaseRequest::new("login works");
        req.error_message = "boom".into();
        req.line = Some(42);
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"title": "login works", "error": "boom", "line": 42})
        );
    }

    #[test]
    fn delete_response_accepts_string_count() {
        let resp: DeleteTestcaseResponse = serde_json::from_value(json!({"deleted": "3"})).unwrap();
        assert_eq!(resp.deleted, 3);
    }

    #[test]
    fn typed_client_binds_all_methods() {
        let client =
            TestcaseServiceClient::connect(ClientBuilder::new("http://localhost:1")).unwrap();
        assert_eq!(client.create.path(), "/testcase.v1.TestcaseService/Create");
        assert_eq!(client.list.path(), "/testcase.v1.TestcaseService/List");
        assert_eq!(client.delete.path(), "/testcase.v1.TestcaseService/Delete");
    }
}
