//! Component factory provider: template name -> creation handle.

use std::{
    collections::HashMap,
    future::Future,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Bytes;
use futures::future::try_join_all;
use serde::Deserialize;
use thiserror::Error;

use crate::plan::DeploymentPlan;

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Invalid artifact {}: {reason}", .path.display())]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("Failed to read artifacts under {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything needed to create (and later verify) one kind of component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryHandle {
    pub template: String,
    /// Creation bytecode, without constructor arguments.
    pub bytecode: Bytes,
    /// Source file the contract was compiled from, e.g. `contracts/Velo.sol`.
    pub source_name: Option<String>,
    /// Compiler build info for source verification.
    pub build_info: Option<PathBuf>,
}

impl FactoryHandle {
    pub fn new(template: impl Into<String>, bytecode: Bytes) -> Self {
        Self {
            template: template.into(),
            bytecode,
            source_name: None,
            build_info: None,
        }
    }

    /// Fully qualified contract name, `source:Contract`, when the source is known.
    pub fn qualified_name(&self) -> String {
        match &self.source_name {
            Some(source) => format!("{}:{}", source, self.template),
            None => self.template.clone(),
        }
    }
}

/// Resolves template names to creation handles.
pub trait FactoryProvider: Send + Sync {
    fn resolve(
        &self,
        template: &str,
    ) -> impl Future<Output = Result<FactoryHandle, FactoryError>> + Send;
}

/// Handles for every template of a plan, resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct FactoryRegistry {
    handles: HashMap<String, FactoryHandle>,
}

impl FactoryRegistry {
    /// Resolve every template of `plan` concurrently.
    ///
    /// Resolutions are read-only and independent, so they are issued together and joined
    /// before any sequencing starts.
    pub async fn resolve_all<P: FactoryProvider>(
        provider: &P,
        plan: &DeploymentPlan,
    ) -> Result<Self, FactoryError> {
        let templates = plan.templates();
        tracing::debug!(count = templates.len(), "Resolving component factories");

        let handles = try_join_all(templates.into_iter().map(|t| provider.resolve(t))).await?;
        Ok(Self::from_handles(handles))
    }

    pub fn from_handles(handles: impl IntoIterator<Item = FactoryHandle>) -> Self {
        Self {
            handles: handles
                .into_iter()
                .map(|h| (h.template.clone(), h))
                .collect(),
        }
    }

    pub fn get(&self, template: &str) -> Result<&FactoryHandle, FactoryError> {
        self.handles
            .get(template)
            .ok_or_else(|| FactoryError::UnknownTemplate(template.to_string()))
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Compiled artifact as written by Hardhat.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    contract_name: String,
    source_name: Option<String>,
    bytecode: Bytes,
    #[serde(default)]
    link_references: HashMap<String, serde_json::Value>,
}

/// Debug file next to each artifact, pointing at the build info.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactDebug {
    build_info: PathBuf,
}

/// Reads Hardhat-style artifacts (`<root>/**/<Template>.json`).
#[derive(Debug, Clone)]
pub struct ArtifactFactoryProvider {
    root: PathBuf,
}

impl ArtifactFactoryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Depth-first search for `<template>.json`, skipping `build-info`.
    fn find_artifact(dir: &Path, file_name: &str) -> std::io::Result<Option<PathBuf>> {
        let mut subdirs = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                if entry.file_name() != "build-info" {
                    subdirs.push(path);
                }
            } else if entry.file_name() == file_name {
                return Ok(Some(path));
            }
        }

        subdirs.sort();
        for subdir in subdirs {
            if let Some(found) = Self::find_artifact(&subdir, file_name)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn load(root: &Path, template: &str) -> Result<FactoryHandle, FactoryError> {
        let path = Self::find_artifact(root, &format!("{template}.json"))
            .map_err(|source| FactoryError::Io {
                path: root.to_path_buf(),
                source,
            })?
            .ok_or_else(|| FactoryError::UnknownTemplate(template.to_string()))?;

        let invalid = |reason: String| FactoryError::InvalidArtifact {
            path: path.clone(),
            reason,
        };

        let content = std::fs::read_to_string(&path).map_err(|e| invalid(e.to_string()))?;
        let artifact: Artifact =
            serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;

        if artifact.contract_name != template {
            return Err(invalid(format!(
                "artifact describes `{}`, expected `{}`",
                artifact.contract_name, template
            )));
        }
        if artifact.bytecode.is_empty() {
            return Err(invalid("empty bytecode, contract is abstract or an interface".into()));
        }
        if !artifact.link_references.is_empty() {
            return Err(invalid("bytecode requires library linking".into()));
        }

        let build_info = Self::build_info_path(&path);

        tracing::debug!(template, path = %path.display(), "Artifact resolved");

        Ok(FactoryHandle {
            template: template.to_string(),
            bytecode: artifact.bytecode,
            source_name: artifact.source_name,
            build_info,
        })
    }

    /// Follow `<Template>.dbg.json` to the build info file, if there is one.
    fn build_info_path(artifact_path: &Path) -> Option<PathBuf> {
        let dbg_path = artifact_path.with_extension("dbg.json");
        let content = std::fs::read_to_string(&dbg_path).ok()?;
        let debug: ArtifactDebug = serde_json::from_str(&content).ok()?;
        let parent = artifact_path.parent()?;
        Some(parent.join(debug.build_info))
    }
}

impl FactoryProvider for ArtifactFactoryProvider {
    async fn resolve(&self, template: &str) -> Result<FactoryHandle, FactoryError> {
        let root = self.root.clone();
        let template = template.to_string();

        tokio::task::spawn_blocking(move || Self::load(&root, &template))
            .await
            .map_err(|e| FactoryError::Io {
                path: self.root.clone(),
                source: std::io::Error::other(e),
            })?
    }
}
