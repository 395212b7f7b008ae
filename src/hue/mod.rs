pub mod archive;
pub mod grouping;
pub mod models;

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;

use self::grouping::{assign_zones, group_sensor_states, SensorSnapshot};
use self::models::{
    parse_hue_timestamp, ClipResponse, ContactSensor, GroupsResponse, HueApiError,
    LightsResponse, RawContactSensor, RawLight, Room, SensorsResponse, Switch, TokenResponse,
};

/// Client for the Hue Remote API (cloud-proxied bridge access).
///
/// Cheap to clone; all clones share one HTTP pool and one cached OAuth
/// access token.
#[derive(Debug, Clone)]
pub struct HueClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    /// Bridge whitelist user, used in v1 paths and as the v2 application key.
    username: String,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    /// Unix timestamp (seconds) when this token expires.
    expires_at: i64,
}

/// Everything the bridge knows, fetched in one joined round.
#[derive(Debug)]
pub struct FullConfig {
    pub rooms: Vec<Room>,
    pub sensors: Vec<SensorSnapshot>,
    pub lights: Vec<(String, RawLight)>,
    pub switches: Vec<Switch>,
    pub contact_sensors: Vec<ContactSensor>,
}

impl HueClient {
    pub fn new(config: &Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                http: Client::new(),
                base_url: config.hue_base_url.clone(),
                client_id: config.hue_client_id.clone(),
                client_secret: config.hue_client_secret.clone(),
                refresh_token: config.hue_refresh_token.clone(),
                username: config.hue_username.clone(),
                token: Mutex::new(None),
            }),
        }
    }

    /// Returns a valid access token, refreshing it if necessary.
    async fn access_token(&self) -> Result<String> {
        let mut guard = self.inner.token.lock().await;
        let now = chrono::Utc::now().timestamp();

        if let Some(ref cached) = *guard {
            // Refresh 60 s before expiry
            if cached.expires_at > now + 60 {
                return Ok(cached.access_token.clone());
            }
        }

        info!("Refreshing Hue access token");
        let token = self.fetch_token().await?;
        let access_token = token.access_token.clone();

        *guard = Some(CachedToken {
            access_token: token.access_token,
            expires_at: now + token.expires_in,
        });

        Ok(access_token)
    }

    async fn fetch_token(&self) -> Result<TokenResponse> {
        let url = format!("{}/v2/oauth2/token", self.inner.base_url);
        debug!(url = %url, "Requesting Hue token");

        let response = self
            .inner
            .http
            .post(&url)
            .basic_auth(&self.inner.client_id, Some(&self.inner.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.inner.refresh_token.as_str()),
            ])
            .send()
            .await
            .context("Hue token request failed")?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HueApiError::TokenRejected(body).into());
        }

        response
            .json::<TokenResponse>()
            .await
            .context("Failed to deserialize Hue token response")
    }

    /// GET a v1 (classic) endpoint: `/route/api/{username}/{endpoint}`.
    async fn get_v1(&self, endpoint: &str) -> Result<Vec<u8>> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/route/api/{}/{endpoint}",
            self.inner.base_url, self.inner.username
        );
        debug!(endpoint = %endpoint, "Fetching v1 endpoint");

        let response = self
            .inner
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .with_context(|| format!("Hue {endpoint} request failed"))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read Hue {endpoint} response body"))?;

        if !status.is_success() {
            return Err(HueApiError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            }
            .into());
        }

        archive::save(endpoint, &bytes).await;
        Ok(bytes.to_vec())
    }

    /// GET a v2 (CLIP) resource: `/route/clip/v2/resource/{resource}`.
    async fn get_v2(&self, resource: &str) -> Result<Vec<u8>> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/route/clip/v2/resource/{resource}",
            self.inner.base_url
        );
        debug!(resource = %resource, "Fetching v2 resource");

        let response = self
            .inner
            .http
            .get(&url)
            .bearer_auth(&token)
            .header("hue-application-key", &self.inner.username)
            .send()
            .await
            .with_context(|| format!("Hue v2 {resource} request failed"))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read Hue v2 {resource} response body"))?;

        if !status.is_success() {
            return Err(HueApiError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            }
            .into());
        }

        archive::save(resource, &bytes).await;
        Ok(bytes.to_vec())
    }

    /// Raw v1 sensor map, one record per sub-sensor.
    pub async fn sensors(&self) -> Result<SensorsResponse> {
        let bytes = self.get_v1("sensors").await?;
        serde_json::from_slice(&bytes).context("Failed to deserialize Hue sensors response")
    }

    /// Logical multi-part sensors, grouped by identity prefix.
    pub async fn sensor_states(&self) -> Result<Vec<SensorSnapshot>> {
        Ok(group_sensor_states(&self.sensors().await?))
    }

    pub async fn lights(&self) -> Result<Vec<(String, RawLight)>> {
        let bytes = self.get_v1("lights").await?;
        let lights: LightsResponse =
            serde_json::from_slice(&bytes).context("Failed to deserialize Hue lights response")?;
        Ok(lights.into_iter().collect())
    }

    /// Rooms only — entertainment zones and other group types are skipped.
    pub async fn rooms(&self) -> Result<Vec<Room>> {
        let bytes = self.get_v1("groups").await?;
        let groups: GroupsResponse =
            serde_json::from_slice(&bytes).context("Failed to deserialize Hue groups response")?;

        Ok(groups
            .into_iter()
            .filter(|(_, g)| g.group_type == "Room")
            .map(|(id, g)| Room {
                id,
                name: g.name,
                class: g.class,
                lights: g.lights,
                sensors: g.sensors,
                any_on: g.state.as_ref().and_then(|s| s.any_on).unwrap_or(false),
            })
            .collect())
    }

    /// Wall switches and dimmers, from the v1 sensor map.
    pub async fn switches(&self) -> Result<Vec<Switch>> {
        let sensors = self.sensors().await?;

        Ok(sensors
            .into_iter()
            .filter_map(|(id, s)| {
                let switch_type = match s.sensor_type.as_str() {
                    "ZLLSwitch" => "dimmer",
                    "ZGPSwitch" => "tap",
                    _ => return None,
                };
                let prefix = s
                    .uniqueid
                    .as_deref()
                    .and_then(|u| u.split('-').next())
                    .map(str::to_owned)
                    .unwrap_or(id);
                Some(Switch {
                    id: prefix,
                    name: s.name,
                    switch_type,
                    last_button_event: s.state.buttonevent,
                    last_updated: s
                        .state
                        .lastupdated
                        .as_deref()
                        .and_then(parse_hue_timestamp),
                    battery: s.config.battery,
                    reachable: s.config.reachable,
                })
            })
            .collect())
    }

    /// Contact (door/window) sensors, v2-only.
    pub async fn contact_sensors(&self) -> Result<Vec<ContactSensor>> {
        let bytes = self.get_v2("contact").await?;
        let resp: ClipResponse<RawContactSensor> = serde_json::from_slice(&bytes)
            .context("Failed to deserialize Hue contact sensors response")?;
        Ok(resp.data.into_iter().map(Into::into).collect())
    }

    /// Fetch the full bridge picture in one joined round.
    ///
    /// The five top-level fetches are independent and read-only, so they run
    /// concurrently. Contact sensors are optional — older bridges do not
    /// expose the v2 resource — and degrade to an empty list with a warning
    /// instead of failing the join.
    pub async fn full_config(&self) -> Result<FullConfig> {
        let (rooms, mut sensors, lights, switches, contact_sensors) = tokio::try_join!(
            self.rooms(),
            self.sensor_states(),
            self.lights(),
            self.switches(),
            async {
                Ok::<_, anyhow::Error>(self.contact_sensors().await.unwrap_or_else(|e| {
                    warn!(error = %e, "Contact sensors unavailable, continuing without them");
                    Vec::new()
                }))
            },
        )?;

        assign_zones(&mut sensors, &rooms);

        Ok(FullConfig {
            rooms,
            sensors,
            lights,
            switches,
            contact_sensors,
        })
    }
}
