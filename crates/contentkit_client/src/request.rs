//! Request descriptors and their typed results.

use crate::cancel::RequestTag;
use crate::config::{StackConfig, ENVIRONMENT_HEADER, REQUIRED_HEADERS};
use crate::error::{ContentError, ContentResult};
use crate::transport::{Method, TransportRequest};
use contentkit_cache::{ContentHasher, ContentKey, RequestEcho};
use contentkit_query::{Projection, Query, QuerySpec};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A request the client can execute under a cache policy.
///
/// Implementations describe where a request goes and how its response
/// body is read. Everything else (header merging, content keys, cache
/// handling) is shared.
pub trait ContentRequest: Send + Sync + 'static {
    /// Typed result of a successful request.
    type Output: Send + 'static;

    /// Cancellation class of the request.
    fn tag(&self) -> RequestTag;

    /// Path below the versioned base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::MalformedPredicate`] if a path segment is
    /// empty.
    fn endpoint(&self) -> ContentResult<String>;

    /// Outgoing parameter document.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::MalformedPredicate`] if the request was
    /// built from invalid arguments.
    fn params(&self) -> ContentResult<Map<String, Value>>;

    /// Call-level headers, merged over the stack headers.
    fn headers(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Content type uid recorded alongside cached responses.
    fn class_uid(&self) -> Option<String> {
        None
    }

    /// Reads a response body.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Decode`] if the body has the wrong shape.
    fn parse(&self, body: &Value) -> ContentResult<Self::Output>;
}

/// A request resolved against a stack configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    /// Cancellation class.
    pub tag: RequestTag,
    /// Fully resolved URL.
    pub url: String,
    /// Outgoing parameters, including `environment`.
    pub params: Map<String, Value>,
    /// Stack headers with call headers merged over them.
    pub headers: BTreeMap<String, String>,
    /// Content key naming the cached response.
    pub key: ContentKey,
    /// Content type uid, if any.
    pub class_uid: Option<String>,
}

impl PreparedRequest {
    /// Resolves `request` against `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::MissingHeaders`] if credentials are absent
    /// after merging, or the request's own endpoint or parameter error.
    pub fn build<R: ContentRequest>(config: &StackConfig, request: &R) -> ContentResult<Self> {
        let mut headers = config.stack_headers();
        headers.extend(request.headers());
        validate_headers(&headers)?;

        let url = format!("{}/{}", config.base_url(), request.endpoint()?);
        let mut params = request.params()?;
        if let Some(environment) = headers.get(ENVIRONMENT_HEADER) {
            params
                .entry(ENVIRONMENT_HEADER)
                .or_insert_with(|| Value::String(environment.clone()));
        }

        let key = ContentHasher::content_key(&url, &params, &headers);
        Ok(Self {
            tag: request.tag(),
            url,
            params,
            headers,
            key,
            class_uid: request.class_uid(),
        })
    }

    /// Returns the transport round-trip for this request.
    pub fn transport_request(&self) -> TransportRequest {
        TransportRequest {
            method: Method::Get,
            url: self.url.clone(),
            params: self.params.clone(),
            headers: self.headers.clone(),
        }
    }

    /// Returns the request echo stored with a cached response.
    pub fn echo(&self) -> RequestEcho {
        RequestEcho {
            url: self.url.clone(),
            params: self.params.clone(),
            headers: self.headers.clone(),
            class_uid: self.class_uid.clone(),
        }
    }
}

/// Checks that every required credential header is present and non-empty.
///
/// # Errors
///
/// Returns [`ContentError::MissingHeaders`] naming each absent header.
pub fn validate_headers(headers: &BTreeMap<String, String>) -> ContentResult<()> {
    let missing: Vec<String> = REQUIRED_HEADERS
        .iter()
        .filter(|name| headers.get(**name).map_or(true, |v| v.is_empty()))
        .map(|name| name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ContentError::MissingHeaders { missing })
    }
}

fn segment(operation: &str, what: &str, value: &str) -> ContentResult<()> {
    if value.is_empty() {
        return Err(ContentError::MalformedPredicate {
            operation: operation.to_string(),
            reason: format!("{what} must not be empty"),
        });
    }
    Ok(())
}

fn decode_list(body: &Value, field: &str) -> ContentResult<Vec<Value>> {
    body.get(field)
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| ContentError::Decode(format!("missing `{field}` array")))
}

fn decode_object(body: &Value, field: &str) -> ContentResult<Value> {
    body.get(field)
        .filter(|v| v.is_object())
        .cloned()
        .ok_or_else(|| ContentError::Decode(format!("missing `{field}` object")))
}

fn flag(params: &mut Map<String, Value>, name: &str) {
    params.insert(name.to_string(), Value::Bool(true));
}

// --- query ---------------------------------------------------------------

/// Entries matched by a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    /// Matched entry documents. Empty for count-only queries.
    pub entries: Vec<Value>,
    /// Total match count, when requested.
    pub count: Option<u64>,
    /// Content type schema, when requested.
    pub schema: Option<Value>,
    /// Content type definition, when requested.
    pub content_type: Option<Value>,
}

impl QueryResponse {
    /// Returns the first entry. For a [`Query::find_one`] lookup this is
    /// the only entry.
    pub fn first(&self) -> Option<&Value> {
        self.entries.first()
    }
}

/// Reads a query body. A single-entry lookup keeps only the first entry.
fn parse_query_response(body: &Value, single: bool) -> ContentResult<QueryResponse> {
    let mut response = QueryResponse {
        count: body.get("count").and_then(Value::as_u64),
        schema: body.get("schema").cloned(),
        content_type: body.get("content_type").cloned(),
        ..QueryResponse::default()
    };
    match body.get("entries") {
        Some(Value::Array(entries)) => response.entries = entries.clone(),
        // `count` alone returns the number in place of the list.
        Some(Value::Number(n)) => response.count = n.as_u64(),
        _ => return Err(ContentError::Decode("missing `entries`".into())),
    }
    if single {
        response.entries.truncate(1);
    }
    Ok(response)
}

impl ContentRequest for QuerySpec {
    type Output = QueryResponse;

    fn tag(&self) -> RequestTag {
        RequestTag::Query
    }

    fn endpoint(&self) -> ContentResult<String> {
        segment("query", "content type", &self.content_type)?;
        Ok(format!("content_types/{}/entries", self.content_type))
    }

    fn params(&self) -> ContentResult<Map<String, Value>> {
        Ok(self.to_params())
    }

    fn headers(&self) -> BTreeMap<String, String> {
        self.headers.clone()
    }

    fn class_uid(&self) -> Option<String> {
        Some(self.content_type.clone())
    }

    fn parse(&self, body: &Value) -> ContentResult<QueryResponse> {
        parse_query_response(body, self.single)
    }
}

impl ContentRequest for Query {
    type Output = QueryResponse;

    fn tag(&self) -> RequestTag {
        RequestTag::Query
    }

    fn endpoint(&self) -> ContentResult<String> {
        segment("query", "content type", self.content_type())?;
        Ok(format!("content_types/{}/entries", self.content_type()))
    }

    fn params(&self) -> ContentResult<Map<String, Value>> {
        Ok(self.to_params()?)
    }

    fn headers(&self) -> BTreeMap<String, String> {
        self.snapshot().map(|spec| spec.headers).unwrap_or_default()
    }

    fn class_uid(&self) -> Option<String> {
        Some(self.content_type().to_string())
    }

    fn parse(&self, body: &Value) -> ContentResult<QueryResponse> {
        parse_query_response(body, self.is_single())
    }
}

// --- entry ---------------------------------------------------------------

/// Fetch of a single entry by uid.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRequest {
    content_type: String,
    uid: String,
    params: Map<String, Value>,
    projection: Projection,
    headers: BTreeMap<String, String>,
}

impl EntryRequest {
    /// Creates a request for entry `uid` of `content_type`.
    pub fn new(content_type: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            uid: uid.into(),
            params: Map::new(),
            projection: Projection::new(),
            headers: BTreeMap::new(),
        }
    }

    /// Requests the entry in `locale`.
    pub fn locale(mut self, locale: &str) -> Self {
        self.params.insert("locale".into(), Value::String(locale.into()));
        self
    }

    /// Returns only the given top-level fields.
    pub fn only<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection.only(fields);
        self
    }

    /// Returns all top-level fields except the given ones.
    pub fn except<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection.except(fields);
        self
    }

    /// Expands `reference` and returns only `fields` of it.
    pub fn only_with_reference<I, S>(mut self, fields: I, reference: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection.only_reference(reference, fields);
        self
    }

    /// Expands `reference` and omits `fields` from it.
    pub fn except_with_reference<I, S>(mut self, fields: I, reference: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection.except_reference(reference, fields);
        self
    }

    /// Expands a reference field.
    pub fn include_reference(mut self, reference: &str) -> Self {
        self.projection.include_reference(reference);
        self
    }

    /// Falls back to the master locale for untranslated fields.
    pub fn include_fallback(mut self) -> Self {
        flag(&mut self.params, "include_fallback");
        self
    }

    /// Returns the content type definition with the entry.
    pub fn include_content_type(mut self) -> Self {
        flag(&mut self.params, "include_content_type");
        flag(&mut self.params, "include_global_field_schema");
        self
    }

    /// Returns entries embedded in rich text fields.
    pub fn include_embedded_items(mut self) -> Self {
        self.params
            .insert("include_embedded_items[]".into(), Value::String("BASE".into()));
        self
    }

    /// Returns entry metadata.
    pub fn include_metadata(mut self) -> Self {
        flag(&mut self.params, "include_metadata");
        self
    }

    /// Adds a call-level header.
    pub fn set_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

impl ContentRequest for EntryRequest {
    type Output = Value;

    fn tag(&self) -> RequestTag {
        RequestTag::Entry
    }

    fn endpoint(&self) -> ContentResult<String> {
        segment("entry", "content type", &self.content_type)?;
        segment("entry", "entry uid", &self.uid)?;
        Ok(format!("content_types/{}/entries/{}", self.content_type, self.uid))
    }

    fn params(&self) -> ContentResult<Map<String, Value>> {
        let mut params = self.params.clone();
        self.projection.apply(&mut params);
        Ok(params)
    }

    fn headers(&self) -> BTreeMap<String, String> {
        self.headers.clone()
    }

    fn class_uid(&self) -> Option<String> {
        Some(self.content_type.clone())
    }

    fn parse(&self, body: &Value) -> ContentResult<Value> {
        decode_object(body, "entry")
    }
}

// --- assets --------------------------------------------------------------

/// Fetch of a single asset by uid.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRequest {
    uid: String,
    params: Map<String, Value>,
    headers: BTreeMap<String, String>,
}

impl AssetRequest {
    /// Creates a request for asset `uid`.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            params: Map::new(),
            headers: BTreeMap::new(),
        }
    }

    /// Returns the asset's dimensions.
    pub fn include_dimension(mut self) -> Self {
        flag(&mut self.params, "include_dimension");
        self
    }

    /// Falls back to the master locale.
    pub fn include_fallback(mut self) -> Self {
        flag(&mut self.params, "include_fallback");
        self
    }

    /// Requests the asset in `locale`.
    pub fn locale(mut self, locale: &str) -> Self {
        self.params.insert("locale".into(), Value::String(locale.into()));
        self
    }

    /// Adds a call-level header.
    pub fn set_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

impl ContentRequest for AssetRequest {
    type Output = Value;

    fn tag(&self) -> RequestTag {
        RequestTag::Asset
    }

    fn endpoint(&self) -> ContentResult<String> {
        segment("asset", "asset uid", &self.uid)?;
        Ok(format!("assets/{}", self.uid))
    }

    fn params(&self) -> ContentResult<Map<String, Value>> {
        Ok(self.params.clone())
    }

    fn headers(&self) -> BTreeMap<String, String> {
        self.headers.clone()
    }

    fn parse(&self, body: &Value) -> ContentResult<Value> {
        decode_object(body, "asset")
    }
}

/// Assets returned by an asset listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetList {
    /// Asset documents.
    pub assets: Vec<Value>,
    /// Total asset count, when requested.
    pub count: Option<u64>,
}

/// Listing of the stack's assets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetLibraryRequest {
    params: Map<String, Value>,
    headers: BTreeMap<String, String>,
}

impl AssetLibraryRequest {
    /// Creates an unfiltered listing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorts ascending by `key`.
    pub fn ascending(mut self, key: &str) -> Self {
        self.params.remove("desc");
        self.params.insert("asc".into(), Value::String(key.into()));
        self
    }

    /// Sorts descending by `key`.
    pub fn descending(mut self, key: &str) -> Self {
        self.params.remove("asc");
        self.params.insert("desc".into(), Value::String(key.into()));
        self
    }

    /// Includes the total asset count.
    pub fn include_count(mut self) -> Self {
        flag(&mut self.params, "include_count");
        self
    }

    /// Returns URLs relative to the asset host.
    pub fn include_relative_url(mut self) -> Self {
        flag(&mut self.params, "relative_urls");
        self
    }

    /// Skips the first `count` assets.
    pub fn skip(mut self, count: u32) -> Self {
        self.params.insert("skip".into(), Value::from(count));
        self
    }

    /// Returns at most `count` assets.
    pub fn limit(mut self, count: u32) -> Self {
        self.params.insert("limit".into(), Value::from(count));
        self
    }

    /// Falls back to the master locale.
    pub fn include_fallback(mut self) -> Self {
        flag(&mut self.params, "include_fallback");
        self
    }

    /// Adds a call-level header.
    pub fn set_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

impl ContentRequest for AssetLibraryRequest {
    type Output = AssetList;

    fn tag(&self) -> RequestTag {
        RequestTag::AssetLibrary
    }

    fn endpoint(&self) -> ContentResult<String> {
        Ok("assets".into())
    }

    fn params(&self) -> ContentResult<Map<String, Value>> {
        Ok(self.params.clone())
    }

    fn headers(&self) -> BTreeMap<String, String> {
        self.headers.clone()
    }

    fn parse(&self, body: &Value) -> ContentResult<AssetList> {
        Ok(AssetList {
            assets: decode_list(body, "assets")?,
            count: body.get("count").and_then(Value::as_u64),
        })
    }
}

// --- content types -------------------------------------------------------

/// Content type schemas returned by a listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentTypeList {
    /// Content type definitions.
    pub content_types: Vec<Value>,
    /// Total count, when requested.
    pub count: Option<u64>,
}

/// Listing of the stack's content type schemas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentTypesRequest {
    params: Map<String, Value>,
    headers: BTreeMap<String, String>,
}

impl ContentTypesRequest {
    /// Creates an unfiltered listing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expands global fields inside each schema.
    pub fn include_global_field_schema(mut self) -> Self {
        flag(&mut self.params, "include_global_field_schema");
        self
    }

    /// Includes the total count.
    pub fn include_count(mut self) -> Self {
        flag(&mut self.params, "include_count");
        self
    }

    /// Adds a call-level header.
    pub fn set_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

impl ContentRequest for ContentTypesRequest {
    type Output = ContentTypeList;

    fn tag(&self) -> RequestTag {
        RequestTag::ContentType
    }

    fn endpoint(&self) -> ContentResult<String> {
        Ok("content_types".into())
    }

    fn params(&self) -> ContentResult<Map<String, Value>> {
        Ok(self.params.clone())
    }

    fn headers(&self) -> BTreeMap<String, String> {
        self.headers.clone()
    }

    fn parse(&self, body: &Value) -> ContentResult<ContentTypeList> {
        Ok(ContentTypeList {
            content_types: decode_list(body, "content_types")?,
            count: body.get("count").and_then(Value::as_u64),
        })
    }
}
