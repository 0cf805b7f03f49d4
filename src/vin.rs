//! VIN decoding against the NHTSA vPIC registry.
//!
//! Used only to enrich the diagnosis text with the vehicle description.

use crate::models::VehicleInfo;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://vpic.nhtsa.dot.gov";

const MIN_VIN_LEN: usize = 5;

#[async_trait]
pub trait VinLookup: Send + Sync {
    /// `Ok(None)` when the registry does not know the VIN.
    async fn decode(&self, vin: &str) -> Result<Option<VehicleInfo>>;
}

#[derive(Debug, Deserialize)]
struct DecodeResponse {
    #[serde(rename = "Results", default)]
    results: Vec<DecodedVehicle>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct DecodedVehicle {
    make: Option<String>,
    model: Option<String>,
    model_year: Option<String>,
    body_class: Option<String>,
    #[serde(rename = "DisplacementL")]
    displacement_l: Option<String>,
    engine_cylinders: Option<String>,
    fuel_type_primary: Option<String>,
}

fn field(value: &Option<String>) -> String {
    value.as_deref().unwrap_or_default().trim().to_string()
}

impl DecodedVehicle {
    fn into_vehicle(self) -> Option<VehicleInfo> {
        let make = field(&self.make);
        let model = field(&self.model);
        let year = field(&self.model_year);
        if make.is_empty() && model.is_empty() && year.is_empty() {
            return None;
        }

        let displacement = field(&self.displacement_l);
        let cylinders = field(&self.engine_cylinders);
        let fuel = field(&self.fuel_type_primary);

        let engine = [
            (!displacement.is_empty()).then(|| format!("{}L", displacement)),
            (!cylinders.is_empty()).then(|| format!("V{}", cylinders)),
            (!fuel.is_empty()).then(|| fuel.clone()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

        Some(VehicleInfo {
            make,
            model,
            year,
            body_class: field(&self.body_class),
            engine,
            fuel,
        })
    }
}

pub struct NhtsaVinClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl NhtsaVinClient {
    pub fn new(client: Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl VinLookup for NhtsaVinClient {
    async fn decode(&self, vin: &str) -> Result<Option<VehicleInfo>> {
        let vin = vin.trim().to_uppercase();
        if vin.len() < MIN_VIN_LEN || !vin.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Ok(None);
        }

        let url = format!(
            "{}/api/vehicles/decodevinvalues/{}?format=json",
            self.base_url, vin
        );
        tracing::debug!("Decoding VIN {}", vin);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Vin(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!("VIN registry error (status {})", status);
            return Err(Error::Vin(format!("registry returned status {}", status)));
        }

        let decoded: DecodeResponse = response
            .json()
            .await
            .map_err(|e| Error::Vin(format!("unexpected registry response: {}", e)))?;

        Ok(decoded
            .results
            .into_iter()
            .next()
            .and_then(DecodedVehicle::into_vehicle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_client(server: &MockServer) -> NhtsaVinClient {
        NhtsaVinClient::new(Client::new(), &server.uri(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_decode_builds_engine_description() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/vehicles/decodevinvalues/MHFXW42G8K1234567"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Results": [{
                    "Make": "TOYOTA",
                    "Model": "Innova",
                    "ModelYear": "2019",
                    "BodyClass": "Minivan",
                    "DisplacementL": "2.4",
                    "EngineCylinders": "4",
                    "FuelTypePrimary": "Diesel"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let vehicle = make_client(&server)
            .decode(" mhfxw42g8k1234567 ")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(vehicle.make, "TOYOTA");
        assert_eq!(vehicle.year, "2019");
        assert_eq!(vehicle.engine, "2.4L V4 Diesel");
        assert_eq!(vehicle.body_class, "Minivan");
    }

    #[tokio::test]
    async fn test_empty_decode_is_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Results": [{ "Make": "", "Model": "", "ModelYear": "", "ErrorCode": "11" }]
            })))
            .mount(&server)
            .await;

        assert!(make_client(&server).decode("ABCDE12345").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_short_vin_skips_lookup() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        assert!(make_client(&server).decode("AB1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_registry_error_is_vin_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = make_client(&server).decode("ABCDE12345").await.unwrap_err();
        assert!(matches!(err, Error::Vin(_)));
    }
}
