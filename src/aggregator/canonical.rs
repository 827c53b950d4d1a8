//! Resolve raw stack traces into canonical, root-first method id arrays.
//!
//! Canonicalization never fails: any dictionary miss is replaced by the
//! `<UnknownMethod>` / `<UnknownClass>` sentinels and counted.

use crate::intern::{FrameType, FxIndexMap, Interner, Method};
use crate::source::{EventKind, EventSource, RawFrame, Sample, SampleKind};
use crate::utils::config::{UNKNOWN_CLASS_NAME, UNKNOWN_METHOD_NAME};
use log::debug;

/// Identity of a raw stack as seen by one conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RawStackKey {
    stack_id: u64,
    class_frame: Option<(u64, FrameType)>,
}

/// Owner of the symbol, method and canonical stack tables.
#[derive(Debug)]
pub struct StackCanonicalizer {
    event_kind: EventKind,
    symbols: Interner<Box<[u8]>>,
    methods: Interner<Method>,
    stacks: Interner<Box<[u32]>>,
    cache: FxIndexMap<RawStackKey, u32>,
    unresolved: u64,
}

impl StackCanonicalizer {
    pub fn new(event_kind: EventKind) -> Self {
        Self {
            event_kind,
            symbols: Interner::new(),
            methods: Interner::new(),
            stacks: Interner::new(),
            cache: FxIndexMap::default(),
            unresolved: 0,
        }
    }

    /// Canonical stack id for `sample`, resolving it on first sight.
    pub fn canonicalize(&mut self, source: &dyn EventSource, sample: &Sample) -> u32 {
        let class_frame = self
            .event_kind
            .has_class_frame()
            .then(|| (sample.extra.unwrap_or(0), class_frame_type(sample.kind)));
        let key = RawStackKey {
            stack_id: sample.stack_id,
            class_frame,
        };
        if let Some(&id) = self.cache.get(&key) {
            return id;
        }

        let mut stack = Vec::new();
        match source.stack_trace(sample.stack_id) {
            Some(frames) => {
                stack.reserve(frames.len() + 1);
                // raw traces are leaf-first
                for frame in frames.iter().rev() {
                    let method = self.resolve_frame(source, frame);
                    stack.push(method);
                }
            }
            None => {
                debug!("Stack trace {} not found, using sentinel frame", sample.stack_id);
                self.unresolved += 1;
                let method = self.unknown_method();
                stack.push(method);
            }
        }
        if let Some((class_id, frame_type)) = class_frame {
            let method = self.resolve_class_frame(source, class_id, frame_type);
            stack.push(method);
        }

        let id = self.stacks.index(stack.into_boxed_slice());
        self.cache.insert(key, id);
        id
    }

    fn resolve_frame(&mut self, source: &dyn EventSource, frame: &RawFrame) -> u32 {
        let method_ref = source.method(frame.method);
        let class_name = method_ref
            .and_then(|m| source.class(m.class))
            .and_then(|c| source.symbol(c.name))
            .map(normalize_class_name);
        let method_name = method_ref.and_then(|m| source.symbol(m.name));

        let class_name = match class_name {
            Some(name) => self.symbols.index(name.into_boxed_slice()),
            None => self.sentinel(UNKNOWN_CLASS_NAME),
        };
        let method_name = match method_name {
            Some(name) => self.symbols.index(Box::from(name)),
            None => self.sentinel(UNKNOWN_METHOD_NAME),
        };

        self.methods.index(Method::new(
            class_name,
            method_name,
            frame.location,
            frame.frame_type,
        ))
    }

    fn resolve_class_frame(
        &mut self,
        source: &dyn EventSource,
        class_id: u64,
        frame_type: FrameType,
    ) -> u32 {
        let class_name = source
            .class(class_id)
            .and_then(|c| source.symbol(c.name))
            .map(normalize_class_name);
        let class_name = match class_name {
            Some(name) => self.symbols.index(name.into_boxed_slice()),
            None => self.sentinel(UNKNOWN_CLASS_NAME),
        };
        let method_name = self.symbols.index(Box::from(&b""[..]));
        self.methods
            .index(Method::new(class_name, method_name, 0, frame_type))
    }

    fn unknown_method(&mut self) -> u32 {
        let class_name = self.symbols.index(Box::from(UNKNOWN_CLASS_NAME.as_bytes()));
        let method_name = self.symbols.index(Box::from(UNKNOWN_METHOD_NAME.as_bytes()));
        self.methods
            .index(Method::new(class_name, method_name, 0, FrameType::Native))
    }

    fn sentinel(&mut self, name: &str) -> u32 {
        self.unresolved += 1;
        self.symbols.index(Box::from(name.as_bytes()))
    }

    /// Root-first method ids of a canonical stack
    pub fn stack(&self, id: u32) -> Option<&[u32]> {
        self.stacks.get(id).map(|stack| &**stack)
    }

    pub fn stacks(&self) -> &Interner<Box<[u32]>> {
        &self.stacks
    }

    pub fn methods(&self) -> &Interner<Method> {
        &self.methods
    }

    pub fn symbols(&self) -> &Interner<Box<[u8]>> {
        &self.symbols
    }

    /// Raw stacks resolved so far (cache entries)
    pub fn raw_stack_count(&self) -> usize {
        self.cache.len()
    }

    /// Dictionary lookups that fell back to a sentinel
    pub fn unresolved(&self) -> u64 {
        self.unresolved
    }
}

fn class_frame_type(kind: SampleKind) -> FrameType {
    match kind {
        SampleKind::Allocation { outside_tlab: true } => FrameType::Native,
        SampleKind::Allocation {
            outside_tlab: false,
        }
        | SampleKind::Lock
        | SampleKind::Execution => FrameType::Inlined,
    }
}

/// Render a JVM class symbol the way it reads in Java source.
///
/// `java/lang/String` becomes `java.lang.String`, `[I` becomes `int[]` and
/// `[[Ljava/util/Map;` becomes `java.util.Map[][]`.
pub fn normalize_class_name(symbol: &[u8]) -> Vec<u8> {
    let depth = symbol.iter().take_while(|&&b| b == b'[').count();
    if depth == symbol.len() {
        return symbol.to_vec();
    }

    let element = &symbol[depth..];
    let mut name = if depth > 0 {
        match element {
            b"B" => b"byte".to_vec(),
            b"C" => b"char".to_vec(),
            b"S" => b"short".to_vec(),
            b"I" => b"int".to_vec(),
            b"J" => b"long".to_vec(),
            b"Z" => b"boolean".to_vec(),
            b"F" => b"float".to_vec(),
            b"D" => b"double".to_vec(),
            [b'L', inner @ .., b';'] => dotted(inner),
            other => dotted(other),
        }
    } else {
        dotted(element)
    };

    for _ in 0..depth {
        name.extend_from_slice(b"[]");
    }
    name
}

fn dotted(name: &[u8]) -> Vec<u8> {
    name.iter()
        .map(|&b| if b == b'/' { b'.' } else { b })
        .collect()
}
