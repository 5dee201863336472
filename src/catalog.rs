// Copyright 2025 Memophor Labs
// SPDX-License-Identifier: Apache-2.0

//! Endpoint adapters for the MovieBox catalog.
//!
//! Each operation builds the upstream call for one public endpoint and
//! post-processes the unwrapped payload.

use reqwest::header::REFERER;
use serde_json::Value;

use crate::error::ProxyError;
use crate::forwarder::Forwarder;
use crate::model::{
    retain_subject_type, DetailPayload, ProcessedSource, SearchParams, SourcesParams,
    SubjectType, TrendingParams,
};
use crate::upstream::RequestOptions;

const HOME_PATH: &str = "/web/home";
const TRENDING_PATH: &str = "/web/subject/trending";
const SEARCH_PATH: &str = "/web/subject/search";
const DETAIL_PATH: &str = "/web/subject/detail";
const DOWNLOAD_PATH: &str = "/web/subject/download";

#[derive(Clone)]
pub struct Catalog {
    forwarder: Forwarder,
}

impl Catalog {
    pub fn new(forwarder: Forwarder) -> Self {
        Self { forwarder }
    }

    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }

    pub async fn homepage(&self) -> Result<Value, ProxyError> {
        self.call(HOME_PATH, RequestOptions::get()).await
    }

    pub async fn trending(&self, params: TrendingParams) -> Result<Value, ProxyError> {
        let options = RequestOptions::get()
            .param("page", params.page)
            .param("perPage", params.per_page)
            .param("uid", &self.forwarder.config().trending_uid);

        self.call(TRENDING_PATH, options).await
    }

    /// Search the catalog. A specific subject type also filters the returned
    /// `items`, since the upstream does not always honor it.
    pub async fn search(&self, params: SearchParams) -> Result<Value, ProxyError> {
        let mut content = self
            .call(SEARCH_PATH, RequestOptions::post_json(params.to_body()))
            .await?;

        if params.subject_type != SubjectType::All {
            retain_subject_type(&mut content, params.subject_type);
        }
        Ok(content)
    }

    pub async fn detail(&self, subject_id: &str) -> Result<Value, ProxyError> {
        let options = RequestOptions::get().param("subjectId", subject_id);
        self.call(DETAIL_PATH, options).await
    }

    /// Resolve download sources. The download endpoint only answers when the
    /// referer points at the subject's page, so the detail lookup comes first.
    pub async fn sources(&self, params: SourcesParams) -> Result<Value, ProxyError> {
        tracing::info!(subject_id = %params.subject_id, "getting sources");

        let info = self.detail(&params.subject_id).await?;
        let detail_path = DetailPayload::detail_path(&info).ok_or(ProxyError::MissingDetailPath)?;

        let referer = self.forwarder.config().movie_page_url(&detail_path);
        tracing::debug!(%referer, "using referer");

        let options = RequestOptions::get()
            .param("subjectId", &params.subject_id)
            .param("se", params.season)
            .param("ep", params.episode)
            .header(REFERER, &referer)?;

        let mut content = self.call(DOWNLOAD_PATH, options).await?;
        attach_processed_sources(&mut content);
        Ok(content)
    }

    async fn call(&self, path: &str, options: RequestOptions) -> Result<Value, ProxyError> {
        let url = self.forwarder.config().api_url(path);
        self.forwarder.forward(&url, options).await
    }
}

/// Append `processedSources` next to a `mediaFileList`, if there is one.
fn attach_processed_sources(content: &mut Value) {
    let Some(object) = content.as_object_mut() else {
        return;
    };
    let Some(files) = object.get("mediaFileList").and_then(Value::as_array) else {
        return;
    };

    let processed: Vec<ProcessedSource> = files.iter().map(ProcessedSource::from_file).collect();
    if let Ok(processed) = serde_json::to_value(processed) {
        object.insert("processedSources".to_string(), processed);
    }
}
