//! Parking backend API client
//!
//! Thin wrapper over `reqwest::Client` for the request/response surface.
//! Every request carries the bearer credential; an HTTP 403 anywhere is
//! mapped to [`Error::AuthExpired`], which is fatal at session scope.

use std::time::Duration;

use patio_common::config::BackendConfig;
use patio_common::models::{Faculty, Session, Spot, Student, Vehicle};
use patio_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::json;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Collection endpoints, as the backend names them
pub const STUDENTS_PATH: &str = "/alunos";
pub const FACULTY_PATH: &str = "/docentes";
pub const VEHICLES_PATH: &str = "/veiculos";
pub const SPOTS_PATH: &str = "/vagas";
pub const SESSIONS_PATH: &str = "/estacionamentos";

/// Request/response client for the parking backend
pub struct ParkingApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ParkingApi {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
        })
    }

    /// Base URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Bearer credential for this authenticated identity
    pub fn token(&self) -> &str {
        &self.token
    }

    async fn decode<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status.as_u16() == 403 {
            return Err(Error::AuthExpired);
        }
        if status.as_u16() == 404 {
            return Err(Error::NotFound(
                response.url().path().to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!("HTTP {status}: {body}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::Decode(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "GET");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        self.decode(response).await
    }

    pub async fn fetch_students(&self) -> Result<Vec<Student>> {
        self.get_json(STUDENTS_PATH).await
    }

    pub async fn fetch_faculty(&self) -> Result<Vec<Faculty>> {
        self.get_json(FACULTY_PATH).await
    }

    pub async fn fetch_vehicles(&self) -> Result<Vec<Vehicle>> {
        self.get_json(VEHICLES_PATH).await
    }

    pub async fn fetch_spots(&self) -> Result<Vec<Spot>> {
        self.get_json(SPOTS_PATH).await
    }

    pub async fn fetch_sessions(&self) -> Result<Vec<Session>> {
        self.get_json(SESSIONS_PATH).await
    }

    /// Create a parking session: `POST /estacionamentos/entrada`
    pub async fn create_session(&self, vehicle_id: &str, spot_id: &str) -> Result<Session> {
        let url = format!("{}{}/entrada", self.base_url, SESSIONS_PATH);
        tracing::debug!(vehicle_id = %vehicle_id, spot_id = %spot_id, "POST entrada");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "veiculoId": vehicle_id, "vagaId": spot_id }))
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        self.decode(response).await
    }

    /// Close a parking session: `PATCH /estacionamentos/saida/{id}`
    pub async fn close_session(&self, session_id: &str, amount_paid: f64) -> Result<Session> {
        let url = format!("{}{}/saida/{}", self.base_url, SESSIONS_PATH, session_id);
        tracing::debug!(session_id = %session_id, amount_paid, "PATCH saida");

        let response = self
            .http
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "valorPago": amount_paid }))
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        self.decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = BackendConfig {
            base_url: "http://localhost:3000/api".to_string(),
            token: "secret".to_string(),
        };
        let api = ParkingApi::new(&config).unwrap();
        assert_eq!(api.base_url(), "http://localhost:3000/api");
        assert_eq!(api.token(), "secret");
    }
}
