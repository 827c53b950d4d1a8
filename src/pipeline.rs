//! End-to-end conversion of an event source into payload sections.
//!
//! Steps:
//! 1. Keep the samples of the configured event kind, stable-sorted by time
//! 2. Canonicalize every sample's stack
//! 3. Aggregate samples into fixed-width buckets
//! 4. Encode each resolution level, then merge it into the next coarser one
//! 5. Encode the global stack dictionary, method table and constant pool

use crate::aggregator::{build_buckets, Bucket, Resolution, StackCanonicalizer};
use crate::encoder::{
    constant_pool, encode_methods, encode_resolution, LzEncoder, PayloadWriter, UsedStacks,
};
use crate::metrics::{timed, ConversionObserver};
use crate::source::{EventKind, EventSource, Sample};
use crate::utils::config::{
    DEFAULT_BUCKET_MS, DEFAULT_RESOLUTION_BATCHES, DEFAULT_SYNONYM_CAPACITY, DEFAULT_TITLE,
    MAX_BUCKETS,
};
use crate::utils::error::ConvertError;
use log::{debug, info, warn};

/// Runtime knobs of a conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterConfig {
    /// Title shown in the rendered document
    pub title: String,

    /// Which samples are converted
    pub event_kind: EventKind,

    /// Width of a finest-level bucket in milliseconds
    pub bucket_ms: u64,

    /// Batch size of every coarser level, finest first
    pub batches: Vec<usize>,

    /// Upper bound on LZ synonym ids
    pub synonym_capacity: usize,

    /// Finest-level buckets a recording may span
    pub max_buckets: usize,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            event_kind: EventKind::default(),
            bucket_ms: DEFAULT_BUCKET_MS,
            batches: DEFAULT_RESOLUTION_BATCHES.to_vec(),
            synonym_capacity: DEFAULT_SYNONYM_CAPACITY,
            max_buckets: MAX_BUCKETS,
        }
    }
}

impl ConverterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_event_kind(mut self, event_kind: EventKind) -> Self {
        self.event_kind = event_kind;
        self
    }

    /// Zero is raised to 1 ms.
    pub fn with_bucket_ms(mut self, bucket_ms: u64) -> Self {
        self.bucket_ms = bucket_ms.max(1);
        self
    }

    /// Zero batch sizes are raised to 1.
    pub fn with_batches(mut self, batches: impl IntoIterator<Item = usize>) -> Self {
        self.batches = batches.into_iter().map(|batch| batch.max(1)).collect();
        self
    }

    pub fn with_synonym_capacity(mut self, capacity: usize) -> Self {
        self.synonym_capacity = capacity;
        self
    }

    pub fn with_max_buckets(mut self, max_buckets: usize) -> Self {
        self.max_buckets = max_buckets;
        self
    }
}

/// Encoded sections ready for template substitution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    pub title: String,

    /// Wall-clock start of the recording, epoch milliseconds
    pub start_ms: u64,

    pub ticks_per_sec: u64,

    pub heatmap: String,

    pub global_stacks: String,

    pub methods: String,

    pub cpool: String,
}

impl Payload {
    /// Value of every template placeholder, by name
    pub fn placeholders(&self) -> [(&'static str, String); 7] {
        [
            ("title", escape_html(&self.title)),
            ("startMs", self.start_ms.to_string()),
            ("ticksPerSecond", self.ticks_per_sec.to_string()),
            ("heatmap", self.heatmap.clone()),
            ("globalStacks", self.global_stacks.clone()),
            ("methods", self.methods.clone()),
            ("cpool", self.cpool.clone()),
        ]
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// One conversion: owns every interner, tree and trie it builds.
#[derive(Debug)]
pub struct Converter {
    config: ConverterConfig,
    canonicalizer: StackCanonicalizer,
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Self {
        let canonicalizer = StackCanonicalizer::new(config.event_kind);
        Self {
            config,
            canonicalizer,
        }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn canonicalizer(&self) -> &StackCanonicalizer {
        &self.canonicalizer
    }

    /// Canonicalize the source's samples and group them into finest buckets.
    ///
    /// **Public** - aggregation half of [`Converter::convert`]
    ///
    /// # Errors
    /// * `ConvertError::TooManyBuckets` - the samples span more than `max_buckets`
    pub fn aggregate(
        &mut self,
        source: &dyn EventSource,
        observer: &mut dyn ConversionObserver,
    ) -> Result<Vec<Bucket>, ConvertError> {
        let event_kind = self.config.event_kind;
        let mut samples: Vec<&Sample> = source
            .samples()
            .iter()
            .filter(|sample| event_kind.accepts(sample.kind))
            .collect();
        // stable: equal timestamps keep arrival order
        samples.sort_by_key(|sample| sample.time);

        observer.count("samples", samples.len() as u64);
        observer.count("skipped_samples", (source.samples().len() - samples.len()) as u64);
        if samples.is_empty() {
            warn!("No {:?} samples found, producing an empty heatmap", event_kind);
        }

        let clock = source.clock();
        let canonicalizer = &mut self.canonicalizer;
        let timeline: Vec<(u64, u32)> = timed(observer, "canonicalize", || {
            samples
                .iter()
                .map(|sample| {
                    let stack_id = canonicalizer.canonicalize(source, sample);
                    (clock.elapsed_ms(sample.time), stack_id)
                })
                .collect()
        });

        let canonicalizer = &self.canonicalizer;
        let bucket_ms = self.config.bucket_ms;
        let max_buckets = self.config.max_buckets;
        let buckets = timed(observer, "aggregate", || {
            build_buckets(timeline, bucket_ms, max_buckets, |id| {
                canonicalizer.stack(id).unwrap_or_default()
            })
        })?;

        observer.count("raw_stacks", canonicalizer.raw_stack_count() as u64);
        observer.count("canonical_stacks", canonicalizer.stacks().len() as u64);
        observer.count("unresolved_references", canonicalizer.unresolved());
        observer.count("buckets", buckets.len() as u64);
        debug!(
            "Aggregated into {} buckets of {}ms",
            buckets.len(),
            self.config.bucket_ms
        );
        Ok(buckets)
    }

    /// Run the whole conversion.
    ///
    /// **Public** - main entry point of the library
    ///
    /// # Arguments
    /// * `source` - Samples and dictionaries to convert
    /// * `observer` - Receives counts, phase timings and section sizes
    ///
    /// # Returns
    /// The encoded payload; an empty sample set still yields a valid one.
    ///
    /// # Errors
    /// * `ConvertError::TooManyBuckets` - a sample lies too far past the recording start
    /// * `ConvertError::Encode` - a value did not fit its field
    pub fn convert(
        mut self,
        source: &dyn EventSource,
        observer: &mut dyn ConversionObserver,
    ) -> Result<Payload, ConvertError> {
        let buckets = self.aggregate(source, observer)?;

        let canonicalizer = &self.canonicalizer;
        let stack = |id: u32| canonicalizer.stack(id).unwrap_or_default();

        // heatmap: every level is written before it is merged away
        let mut used = UsedStacks::new();
        let mut out = PayloadWriter::new();
        let batches = &self.config.batches;
        let heads = timed(observer, "encode_heatmap", || -> Result<usize, ConvertError> {
            out.write_var(batches.len() + 1)?;
            let mut resolution = Resolution::finest(buckets);
            let mut pending = batches.iter();
            let mut heads = 0;
            loop {
                heads += encode_resolution(&mut out, &resolution, stack, &mut used)?;
                let Some(&batch) = pending.next() else {
                    break;
                };
                resolution = resolution.coarsen(batch);
            }
            Ok(heads)
        })?;
        observer.count("heads", heads as u64);
        observer.count("used_stacks", used.len() as u64);
        let heatmap = out.into_string();
        observer.section("heatmap", heatmap.len());

        let capacity = self.config.synonym_capacity;
        let mut out = PayloadWriter::new();
        let summary = timed(observer, "encode_stacks", || {
            let mut lz = LzEncoder::new();
            for &stack_id in used.ordered_keys() {
                lz.add_stack(stack(stack_id));
            }
            lz.finish(&mut out, capacity)
        })?;
        observer.count("lz_nodes", summary.nodes as u64);
        observer.count("lz_synonyms", summary.synonyms as u64);
        let global_stacks = out.into_string();
        observer.section("globalStacks", global_stacks.len());

        let mut out = PayloadWriter::new();
        let method_count = timed(observer, "encode_methods", || {
            encode_methods(&mut out, canonicalizer.methods().ordered_keys())
        })?;
        observer.count("methods", method_count as u64);
        let methods = out.into_string();
        observer.section("methods", methods.len());

        let symbols = canonicalizer.symbols();
        let cpool = constant_pool(symbols.ordered_keys().map(|symbol| &**symbol));
        observer.count("symbols", symbols.len() as u64);
        observer.section("cpool", cpool.len());

        let clock = source.clock();
        info!(
            "Encoded {} heads over {} stacks and {} methods",
            heads,
            used.len(),
            method_count
        );

        Ok(Payload {
            title: self.config.title.clone(),
            start_ms: clock.start_ms,
            ticks_per_sec: clock.ticks_per_sec,
            heatmap,
            global_stacks,
            methods,
            cpool,
        })
    }
}
