//! Client for the hosted backend: drink rows and the catalog over its REST row
//! API, plus the `classify-drink` function.

use std::{future::Future, str::FromStr};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{RequestBuilder, Response, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::{
    config::BackendConfig,
    error::{Error, Result},
    estimate::estimate,
    store::{EntryStore, ListQuery},
    structs::{
        catalog::{CatalogItem, Classification},
        drink_entry::{DrinkEntry, DrinkPatch, DrinkType, Unit},
    },
};

pub const DRINK_LOGS_TABLE: &str = "drink_logs";
pub const CATALOG_TABLE: &str = "drinks_catalog";
pub const CLASSIFY_FUNCTION: &str = "classify-drink";
pub const CATALOG_SEARCH_LIMIT: usize = 10;

/// Rows requested per round-trip when a whole time range is needed.
pub const FETCH_PAGE_SIZE: usize = 1000;

pub struct RemoteStore {
    client: reqwest::Client,
    base_url: Url,
    anon_key: String,
    access_token: Option<String>,
    user_id: Option<String>,
    classifier_disabled: bool,
}

/// A `drink_logs` row as the backend returns it.
///
/// Older clients wrote `quantity` and `consumed_at` next to (or instead of)
/// `qty` and `logged_at`, so every column is optional here and reconciled in
/// the conversion to [`DrinkEntry`].
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct BackendRow {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub drink_type: DrinkType,
    pub qty: Option<f64>,
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit: Unit,
    pub std_drinks: Option<f64>,
    pub logged_at: Option<DateTime<Utc>>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub photo_url: Option<String>,
    pub ai_confidence: Option<f64>,
}

impl TryFrom<BackendRow> for DrinkEntry {
    type Error = Error;

    fn try_from(row: BackendRow) -> Result<Self> {
        let logged_at = row
            .logged_at
            .or(row.consumed_at)
            .or(row.created_at)
            .ok_or_else(|| Error::MalformedRow(format!("row {} has no timestamp", row.id)))?;
        let quantity = row.qty.or(row.quantity).unwrap_or(0.0);
        // rows without a stored count are estimated the same way new logs are
        let standard_drinks = row
            .std_drinks
            .unwrap_or_else(|| estimate(row.drink_type, quantity, row.unit));

        Ok(DrinkEntry {
            id: row.id,
            drink_type: row.drink_type,
            quantity,
            unit: row.unit,
            standard_drinks,
            logged_at,
            notes: row.notes,
            photo_url: row.photo_url,
            ai_confidence: row.ai_confidence,
        })
    }
}

/// Body of an insert or update, in the backend's column names.
#[derive(Serialize, Debug)]
struct RowWrite<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(rename = "type")]
    drink_type: DrinkType,
    qty: f64,
    unit: Unit,
    std_drinks: f64,
    logged_at: DateTime<Utc>,
    notes: Option<&'a str>,
    photo_url: Option<&'a str>,
    ai_confidence: Option<f64>,
}

impl<'a> RowWrite<'a> {
    fn insert(entry: &'a DrinkEntry, user_id: &'a str) -> Self {
        Self {
            id: Some(&entry.id),
            user_id: Some(user_id),
            ..Self::update(entry)
        }
    }

    fn update(entry: &'a DrinkEntry) -> Self {
        Self {
            id: None,
            user_id: None,
            drink_type: entry.drink_type,
            qty: entry.quantity,
            unit: entry.unit,
            std_drinks: entry.standard_drinks,
            logged_at: entry.logged_at,
            notes: entry.notes.as_deref(),
            photo_url: entry.photo_url.as_deref(),
            ai_confidence: entry.ai_confidence,
        }
    }
}

fn into_entries(rows: Vec<BackendRow>) -> Result<Vec<DrinkEntry>> {
    rows.into_iter().map(DrinkEntry::try_from).collect()
}

/// Walks `query` forward one page at a time. The server may cap pages below
/// the requested size, so only an empty page ends the walk.
async fn collect_pages<F, Fut>(
    mut query: ListQuery,
    mut next_page: F,
) -> Result<Vec<DrinkEntry>>
where
    F: FnMut(ListQuery) -> Fut,
    Fut: Future<Output = Result<Vec<DrinkEntry>>>,
{
    let mut entries = Vec::new();
    loop {
        let page = next_page(query).await?;
        if page.is_empty() {
            return Ok(entries);
        }
        query.offset += page.len();
        entries.extend(page);
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Query string for one page of `drink_logs`, newest first.
pub fn list_params(query: &ListQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("select", "*".to_string()),
        ("order", "logged_at.desc".to_string()),
        ("limit", query.limit.to_string()),
        ("offset", query.offset.to_string()),
    ];
    if let Some(from) = query.from {
        params.push(("logged_at", format!("gte.{}", timestamp(from))));
    }
    if let Some(to) = query.to {
        params.push(("logged_at", format!("lte.{}", timestamp(to))));
    }
    params
}

pub fn catalog_params(search: &str) -> Vec<(&'static str, String)> {
    vec![
        ("select", "*".to_string()),
        ("label", format!("ilike.*{}*", search.trim())),
        ("limit", CATALOG_SEARCH_LIMIT.to_string()),
    ]
}

impl RemoteStore {
    pub fn new(
        client: reqwest::Client,
        backend: &BackendConfig,
        classifier_disabled: bool,
    ) -> Result<Self> {
        let url = backend
            .url
            .as_deref()
            .ok_or_else(|| Error::Config("backend url is not set (INTAKE_BACKEND_URL)".into()))?;
        let anon_key = backend
            .anon_key
            .clone()
            .ok_or_else(|| Error::Config("backend anon key is not set (INTAKE_ANON_KEY)".into()))?;

        // `Url::join` drops the last segment unless the base ends with a slash
        let base = if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{url}/")
        };
        let base_url = Url::from_str(&base)
            .map_err(|err| Error::Config(format!("invalid backend url `{url}`: {err}")))?;

        Ok(Self {
            client,
            base_url,
            anon_key,
            access_token: backend.access_token.clone(),
            user_id: backend.user_id.clone(),
            classifier_disabled,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|err| Error::Config(format!("invalid endpoint `{path}`: {err}")))
    }

    fn table_url(&self, table: &str) -> Result<Url> {
        self.endpoint(&format!("rest/v1/{table}"))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {bearer}"))
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api { status, message });
        }
        Ok(response.json::<T>().await?)
    }

    async fn get_rows(&self, query: &ListQuery) -> Result<Vec<DrinkEntry>> {
        let request = self
            .client
            .get(self.table_url(DRINK_LOGS_TABLE)?)
            .query(&list_params(query));

        let response = self.authorize(request).send().await?;
        into_entries(Self::read_json(response).await?)
    }

    async fn get_row(&self, id: &str) -> Result<DrinkEntry> {
        let request = self
            .client
            .get(self.table_url(DRINK_LOGS_TABLE)?)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))]);

        let response = self.authorize(request).send().await?;
        let rows: Vec<BackendRow> = Self::read_json(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(id.to_string()))?
            .try_into()
    }

    #[instrument(skip(self))]
    pub async fn search_catalog(&self, search: &str) -> Result<Vec<CatalogItem>> {
        let request = self
            .client
            .get(self.table_url(CATALOG_TABLE)?)
            .query(&catalog_params(search));

        let response = self.authorize(request).send().await?;
        Self::read_json(response).await
    }

    /// Asks the backend what is in an uploaded photo. Never fails: when the
    /// classifier is disabled or unreachable the mock guess comes back.
    #[instrument(skip(self))]
    pub async fn classify_photo(&self, photo_path: &str) -> Classification {
        if self.classifier_disabled {
            debug!("classifier disabled, using mock");
            return Classification::mock();
        }

        match self.invoke_classifier(photo_path).await {
            Ok(classification) => classification,
            Err(err) => {
                warn!(%err, "classifier not available, using mock");
                Classification::mock()
            }
        }
    }

    async fn invoke_classifier(&self, photo_path: &str) -> Result<Classification> {
        let request = self
            .client
            .post(self.endpoint(&format!("functions/v1/{CLASSIFY_FUNCTION}"))?)
            .json(&json!({ "path": photo_path }));

        let response = self.authorize(request).send().await?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl EntryStore for RemoteStore {
    #[instrument(skip(self))]
    async fn fetch_entries(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DrinkEntry>> {
        let query = ListQuery {
            limit: FETCH_PAGE_SIZE,
            ..ListQuery::between(start, end)
        };
        let entries =
            collect_pages(query, |page| async move { self.get_rows(&page).await }).await?;

        debug!(entries = entries.len(), "fetched range");
        Ok(entries)
    }

    async fn list(&self, query: ListQuery) -> Result<Vec<DrinkEntry>> {
        self.get_rows(&query).await
    }

    #[instrument(skip(self, entry), fields(id = %entry.id))]
    async fn insert(&self, entry: DrinkEntry) -> Result<DrinkEntry> {
        let user_id = self.user_id.as_deref().ok_or(Error::NotAuthenticated)?;

        let request = self
            .client
            .post(self.table_url(DRINK_LOGS_TABLE)?)
            .header("Prefer", "return=representation")
            .json(&RowWrite::insert(&entry, user_id));

        let response = self.authorize(request).send().await?;
        let rows: Vec<BackendRow> = Self::read_json(response).await?;
        match rows.into_iter().next() {
            Some(row) => row.try_into(),
            None => Ok(entry),
        }
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, id: &str, patch: &DrinkPatch) -> Result<DrinkEntry> {
        let mut entry = self.get_row(id).await?;
        entry.apply(patch);

        let request = self
            .client
            .patch(self.table_url(DRINK_LOGS_TABLE)?)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(&RowWrite::update(&entry));

        let response = self.authorize(request).send().await?;
        let rows: Vec<BackendRow> = Self::read_json(response).await?;
        match rows.into_iter().next() {
            Some(row) => row.try_into(),
            None => Ok(entry),
        }
    }
}
