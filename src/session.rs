//! One visualisation session: encoder handle, corpus, reference set and the
//! latest projection, plus the operations exposed across the session boundary.
//!
//! Every operation either completes or leaves the session exactly as it was.
//! The session is single-writer; callers sharing it must serialise access
//! (the HTTP layer keeps it behind a mutex).

use std::sync::Arc;

use crate::config::ScatterConfig;
use crate::embedding::{self, Encoder, EncoderAvailability, EncoderProvider, EncoderSpec};
use crate::error::{PipelineError, Result};
use crate::pipeline::{
    ChunkParams, CorpusStore, EncodingAdapter, OverflowPolicy, PlotData, ProjectedPoint,
    ReferenceSet, Row,
};
use crate::plot::{self, Colormap, PlotOptions};
use crate::projection::{self, PacmapProjector, Projector};

/// Projection plus the corpus generation it was computed from.
struct StoredProjection {
    generation: u64,
    points: Vec<ProjectedPoint>,
}

pub struct Session {
    provider: Arc<dyn EncoderProvider>,
    projector: Arc<dyn Projector>,
    chunking: ChunkParams,
    plot: PlotOptions,
    default_spec: Option<EncoderSpec>,
    spec: Option<EncoderSpec>,
    encoder: Option<Box<dyn Encoder>>,
    corpus: CorpusStore,
    references: ReferenceSet,
    projection: Option<StoredProjection>,
}

impl Session {
    pub fn new(
        provider: Arc<dyn EncoderProvider>,
        projector: Arc<dyn Projector>,
        chunking: ChunkParams,
        plot: PlotOptions,
    ) -> Self {
        Self {
            provider,
            projector,
            chunking,
            plot,
            default_spec: None,
            spec: None,
            encoder: None,
            corpus: CorpusStore::new(),
            references: ReferenceSet::new(),
            projection: None,
        }
    }

    /// Session wired to the local ONNX provider and the neighbor-graph projector.
    pub fn from_config(config: &ScatterConfig) -> anyhow::Result<Self> {
        let provider: Arc<dyn EncoderProvider> =
            Arc::from(embedding::create_provider(&config.embedding)?);
        let projector = Arc::new(PacmapProjector::new(config.projection.clone()));
        let chunking = ChunkParams::from_config(&config.chunking)?;
        let plot = PlotOptions::from_config(&config.plot)?;
        let default_spec = config.embedding.model.clone().map(|model| EncoderSpec {
            model,
            dimensions: config.embedding.dimensions,
        });
        Ok(Self::new(provider, projector, chunking, plot).with_default_encoder(default_spec))
    }

    /// Encoder spec selected on creation and after every reset.
    pub fn with_default_encoder(mut self, spec: Option<EncoderSpec>) -> Self {
        self.default_spec = spec.clone();
        self.spec = spec;
        self
    }

    /// Drop the corpus, reference set, projection and loaded encoder.
    pub fn reset(&mut self) {
        tracing::info!(
            items = self.corpus.len(),
            references = self.references.len(),
            "resetting session"
        );
        self.corpus.clear();
        self.references.clear();
        self.projection = None;
        self.encoder = None;
        self.spec = self.default_spec.clone();
    }

    /// Select the encoder model. Switching models is refused while embeddings
    /// from the current one exist.
    pub fn set_encoder_config(&mut self, model: &str, dimensions: Option<usize>) -> Result<()> {
        let model = model.trim();
        if model.is_empty() {
            return Err(PipelineError::Configuration(
                "model identifier must not be empty".into(),
            ));
        }
        if dimensions == Some(0) {
            return Err(PipelineError::Configuration(
                "dimensions must be greater than zero".into(),
            ));
        }
        let spec = EncoderSpec {
            model: model.to_string(),
            dimensions,
        };
        if self.spec.as_ref() == Some(&spec) {
            return Ok(());
        }
        if !self.corpus.is_empty() || !self.references.is_empty() {
            return Err(PipelineError::Configuration(format!(
                "cannot switch encoder to {model} while {} corpus items and {} references exist; reset first",
                self.corpus.len(),
                self.references.len()
            )));
        }

        tracing::info!(model = %spec.model, dimensions = ?spec.dimensions, "encoder configured");
        self.spec = Some(spec);
        self.encoder = None;
        Ok(())
    }

    pub fn encoder_spec(&self) -> Option<&EncoderSpec> {
        self.spec.as_ref()
    }

    /// Load the encoder from the local cache if possible and report its state.
    pub fn check_encoder(&mut self) -> Result<EncoderAvailability> {
        let Some(spec) = self.spec.clone() else {
            tracing::info!("encoder model not specified");
            return Ok(EncoderAvailability::NotSpecified);
        };
        if self.encoder.is_some() {
            return Ok(EncoderAvailability::Loaded);
        }
        match self.provider.load_cached(&spec) {
            Ok(Some(encoder)) => {
                tracing::info!(model = %spec.model, "encoder loaded from cache");
                self.encoder = Some(encoder);
                Ok(EncoderAvailability::Loaded)
            }
            Ok(None) => Ok(EncoderAvailability::NotDownloaded),
            Err(e) => {
                tracing::error!(model = %spec.model, error = %format!("{e:#}"), "failed to check encoder");
                Err(PipelineError::encoding(e))
            }
        }
    }

    /// Fetch the configured model and load it.
    pub fn download_encoder(&mut self) -> Result<()> {
        let spec = self.require_spec()?.clone();
        tracing::info!(model = %spec.model, "downloading encoder");
        let encoder = self.provider.fetch_and_load(&spec).map_err(|e| {
            tracing::error!(model = %spec.model, error = %format!("{e:#}"), "encoder download failed");
            PipelineError::EncoderUnavailable(format!("download of {} failed: {e:#}", spec.model))
        })?;
        self.encoder = Some(encoder);
        tracing::info!(model = %spec.model, "encoder downloaded and loaded");
        Ok(())
    }

    /// Embed `row[field]` and append it to the corpus.
    pub fn embed_and_append(
        &mut self,
        row: Row,
        field: &str,
        policy: OverflowPolicy,
    ) -> Result<Vec<f32>> {
        self.ensure_encoder()?;
        let encoder = loaded(&self.encoder)?;
        let adapter = EncodingAdapter::new(encoder, &self.chunking);
        let embedding = adapter
            .embed_row(&mut self.corpus, row, field, policy)
            .inspect_err(|e| tracing::error!(error = %e, field, "failed to embed row"))?;
        tracing::info!(items = self.corpus.len(), %policy, "row embedded");
        Ok(embedding)
    }

    /// Embed a reference label and add it to the reference set.
    pub fn embed_reference(&mut self, label: &str) -> Result<Vec<f32>> {
        self.ensure_encoder()?;
        let encoder = loaded(&self.encoder)?;
        let adapter = EncodingAdapter::new(encoder, &self.chunking);
        let embedding = adapter
            .embed_reference(&mut self.references, label)
            .inspect_err(|e| tracing::error!(error = %e, "failed to embed reference"))?;
        tracing::info!(references = self.references.len(), "reference embedded");
        Ok(embedding)
    }

    /// Label of the reference item closest to `text` by cosine similarity.
    pub fn find_closest(&mut self, text: &str) -> Result<String> {
        if self.references.is_empty() {
            tracing::error!("closest-label lookup with no references");
            return Err(PipelineError::EmptyReferenceSet);
        }
        self.ensure_encoder()?;
        let encoder = loaded(&self.encoder)?;
        let query = EncodingAdapter::new(encoder, &self.chunking).embed_single(text)?;
        let hit = self.references.closest(&query)?;
        tracing::info!(label = %hit.label, similarity = hit.similarity, "closest reference found");
        Ok(hit.label.to_string())
    }

    /// Project the whole corpus to `target_dims` and keep the result for plotting.
    pub fn project(&mut self, target_dims: usize) -> Result<&[ProjectedPoint]> {
        let embeddings = self.corpus.embeddings();
        let points = projection::project(self.projector.as_ref(), &embeddings, target_dims)
            .inspect_err(|e| tracing::error!(error = %e, target_dims, "projection failed"))?;
        let stored = self.projection.insert(StoredProjection {
            generation: self.corpus.generation(),
            points,
        });
        Ok(&stored.points)
    }

    /// Assemble plot data from the latest projection.
    ///
    /// Fails with an alignment error if no projection exists or the corpus has
    /// changed since it was computed.
    pub fn assemble_plot(
        &self,
        label_field: &str,
        category_field: Option<&str>,
        colormap: Option<&str>,
    ) -> Result<PlotData> {
        let stored = self.projection.as_ref().ok_or_else(|| {
            PipelineError::Alignment("no projection computed; project the corpus first".into())
        })?;
        if stored.generation != self.corpus.generation() {
            return Err(PipelineError::Alignment(
                "corpus changed since the last projection; project again".into(),
            ));
        }
        let mut options = self.plot;
        if let Some(name) = colormap.filter(|c| !c.is_empty()) {
            options.colormap = name.parse::<Colormap>()?;
        }
        plot::assemble(
            &stored.points,
            self.corpus.items(),
            label_field,
            category_field,
            &options,
        )
    }

    pub fn corpus(&self) -> &CorpusStore {
        &self.corpus
    }

    pub fn references(&self) -> &ReferenceSet {
        &self.references
    }

    fn require_spec(&self) -> Result<&EncoderSpec> {
        self.spec.as_ref().ok_or_else(|| {
            PipelineError::Configuration("no encoder model specified; set a model first".into())
        })
    }

    /// Load the encoder from cache on first use.
    fn ensure_encoder(&mut self) -> Result<()> {
        if self.encoder.is_some() {
            return Ok(());
        }
        let spec = self.require_spec()?.clone();
        match self.provider.load_cached(&spec) {
            Ok(Some(encoder)) => {
                self.encoder = Some(encoder);
                Ok(())
            }
            Ok(None) => Err(PipelineError::EncoderUnavailable(format!(
                "model {} is not downloaded",
                spec.model
            ))),
            Err(e) => Err(PipelineError::encoding(e)),
        }
    }
}

/// Borrow just the encoder field so other session fields stay mutable.
fn loaded(encoder: &Option<Box<dyn Encoder>>) -> Result<&dyn Encoder> {
    encoder
        .as_deref()
        .ok_or_else(|| PipelineError::Internal("encoder not loaded".into()))
}
