use std::fmt;

use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use super::{Dns01Api, Domain, NewRecord, Record};
use crate::{Error, Result};

pub const R01_API_URL: &str = "https://api.r01.ru";

/// Client for the R01 registrar REST API.
pub struct R01Client {
    api_url: String,
    api_token: String,
    http: Client,
}

impl fmt::Debug for R01Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("R01Client")
            .field("api_url", &self.api_url)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

// Every R01 response wraps its payload in `{"content": {"data": ...}}`.
#[derive(Deserialize)]
struct Envelope<T> {
    content: Content<T>,
}

#[derive(Deserialize)]
struct Content<T> {
    data: T,
}

impl R01Client {
    pub fn new(api_url: String, api_token: String) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_token,
            http: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{path}", self.api_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(header::AUTHORIZATION, format!("Bearer {}", self.api_token))
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!("GET {url}");
        let response = self
            .authorized(self.http.get(&url))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = check_status(response, |status| status.is_success()).await?;
        read_data(response).await
    }
}

impl Dns01Api for R01Client {
    async fn list_domains(&self) -> Result<Vec<Domain>> {
        self.get_data("domains").await
    }

    async fn list_records(&self, domain_id: u64) -> Result<Vec<Record>> {
        self.get_data(&format!("domains/{domain_id}/rrecords")).await
    }

    async fn create_record(&self, domain_id: u64, record: &NewRecord) -> Result<u64> {
        let url = self.url(&format!("domains/{domain_id}/rrecords"));
        debug!("POST {url}: {} {}", record.r#type, record.name);
        let response = self
            .authorized(self.http.post(&url))
            .header(header::CONTENT_TYPE, "application/json")
            .json(record)
            .send()
            .await?;
        let response = check_status(response, |status| {
            matches!(status, StatusCode::OK | StatusCode::CREATED)
        })
        .await?;

        #[derive(Deserialize)]
        struct Created {
            id: u64,
        }

        let created: Created = read_data(response).await?;
        Ok(created.id)
    }

    async fn delete_record(&self, domain_id: u64, record_id: u64) -> Result<()> {
        let url = self.url(&format!("domains/{domain_id}/rrecords/{record_id}"));
        debug!("DELETE {url}");
        let response = self
            .authorized(self.http.delete(&url))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        check_status(response, |status| status == StatusCode::OK).await?;
        Ok(())
    }
}

async fn check_status(
    response: Response,
    accept: impl Fn(StatusCode) -> bool,
) -> Result<Response> {
    let status = response.status();
    if accept(status) {
        return Ok(response);
    }
    // The status is what matters; a body that cannot be read is reported empty.
    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            debug!("failed to read registrar error body: {err}");
            String::new()
        }
    };
    Err(Error::Api {
        status: status.as_u16(),
        body,
    })
}

async fn read_data<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.bytes().await?;
    let envelope: Envelope<T> = serde_json::from_slice(&body).map_err(Error::Decode)?;
    Ok(envelope.content.data)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{any, body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const TOKEN: &str = "test-token";

    fn create_client(server: &MockServer) -> R01Client {
        R01Client::new(server.uri(), TOKEN.into())
    }

    fn assert_api_error<T: fmt::Debug>(result: Result<T>, status: u16, body: &str) {
        match result {
            Err(Error::Api {
                status: got_status,
                body: got_body,
            }) => {
                assert_eq!(got_status, status);
                assert_eq!(got_body, body);
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn lists_domains_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/domains"))
            .and(header("Authorization", "Bearer test-token"))
            .and(header("Accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": {"data": [
                    {"id": 11, "domain": "example.com", "status": "active"},
                    {"id": 12, "domain": "example.org"},
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let domains = create_client(&server).list_domains().await.unwrap();
        assert_eq!(
            domains,
            vec![
                Domain {
                    id: 11,
                    domain: "example.com".into()
                },
                Domain {
                    id: 12,
                    domain: "example.org".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn lists_records_of_domain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/domains/11/rrecords"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": {"data": [
                    {"id": 1, "name": "example.com", "type": "A", "ttl": 3600, "data": "192.0.2.1"},
                    {"id": 2, "name": "_acme-challenge.example.com", "type": "TXT", "ttl": 300},
                ]}
            })))
            .mount(&server)
            .await;

        let records = create_client(&server).list_records(11).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, 2);
        assert_eq!(records[1].r#type, "TXT");
        assert_eq!(records[1].ttl, 300);

        let txt = create_client(&server)
            .get_txt_records(11, "_acme-challenge.example.com")
            .await
            .unwrap();
        assert_eq!(txt, vec![records[1].clone()]);
    }

    #[tokio::test]
    async fn creates_record_and_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/domains/11/rrecords"))
            .and(header("Authorization", "Bearer test-token"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(json!({
                "name": "_acme-challenge.example.com",
                "type": "TXT",
                "ttl": 300,
                "data": "challenge-value",
                "info": "letsencrypt-challenge",
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"content": {"data": {"id": 77}}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let record = NewRecord::txt(
            "_acme-challenge.example.com",
            300,
            "challenge-value",
            "letsencrypt-challenge",
        );
        let id = create_client(&server)
            .create_record(11, &record)
            .await
            .unwrap();
        assert_eq!(id, 77);
    }

    #[tokio::test]
    async fn create_accepts_plain_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"content": {"data": {"id": 5}}})),
            )
            .mount(&server)
            .await;

        let record = NewRecord::txt("_acme-challenge.example.com", 300, "v", "n");
        let id = create_client(&server)
            .create_record(11, &record)
            .await
            .unwrap();
        assert_eq!(id, 5);
    }

    #[tokio::test]
    async fn deletes_record() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/domains/11/rrecords/77"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        create_client(&server).delete_record(11, 77).await.unwrap();
    }

    #[tokio::test]
    async fn delete_requires_ok_status() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let result = create_client(&server).delete_record(11, 77).await;
        assert_api_error(result, 204, "");
    }

    #[tokio::test]
    async fn surfaces_status_and_body_for_every_operation() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(403).set_body_string("{\"error\":\"bad token\"}"))
            .mount(&server)
            .await;
        let client = create_client(&server);
        let body = "{\"error\":\"bad token\"}";

        assert_api_error(client.list_domains().await, 403, body);
        assert_api_error(client.list_records(1).await, 403, body);
        let record = NewRecord::txt("_acme-challenge.example.com", 300, "v", "n");
        assert_api_error(client.create_record(1, &record).await, 403, body);
        assert_api_error(client.delete_record(1, 2).await, 403, body);
    }

    #[tokio::test]
    async fn undecodable_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let err = create_client(&server).list_domains().await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "{err:?}");
        assert!(err.is_api());
    }

    #[tokio::test]
    async fn unreachable_registrar_is_transport_error() {
        let client = R01Client::new("http://127.0.0.1:1".into(), TOKEN.into());
        let err = client.list_domains().await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)), "{err:?}");
    }

    #[tokio::test]
    async fn truncated_error_body_keeps_status() {
        use tokio::{
            io::{AsyncReadExt, AsyncWriteExt},
            net::TcpListener,
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            // Promise more body than is sent, then hang up.
            socket
                .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 100\r\n\r\npartial")
                .await
                .unwrap();
        });

        let client = R01Client::new(format!("http://{addr}"), TOKEN.into());
        assert_api_error(client.list_domains().await, 503, "");
    }

    #[test]
    fn debug_hides_token() {
        let client = R01Client::new(format!("{R01_API_URL}/"), TOKEN.into());
        let debug = format!("{client:?}");
        assert!(!debug.contains(TOKEN));
        assert!(debug.contains("https://api.r01.ru\""));
    }
}
