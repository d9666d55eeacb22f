// Extension -> decoder dispatch.
//
// Adapters are built on first lookup and kept for the registry's lifetime.
// Lookup order is fixed: priority decoders (in registration order), then
// the built-in PNG decoder. The registry is Sync; a `static` one can serve
// lookups from the UI while a worker task decodes.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use once_cell::sync::OnceCell;

use crate::decoder::{ImageDecoder, RenderConfig};
use crate::limits::DimensionPolicy;
use crate::png::PngDecoder;
use crate::render::Renderer;
use crate::storage::Storage;

/// Builds one adapter for the registry's dimension policy.
pub type DecoderFactory = fn(DimensionPolicy) -> Box<dyn ImageDecoder>;

fn png_factory(policy: DimensionPolicy) -> Box<dyn ImageDecoder> {
    Box::new(PngDecoder::new(policy))
}

const BUILTIN: &[DecoderFactory] = &[png_factory];

pub struct DecoderRegistry {
    policy: DimensionPolicy,
    priority: Vec<DecoderFactory>,
    decoders: OnceCell<Vec<Box<dyn ImageDecoder>>>,
}

impl DecoderRegistry {
    pub const fn new(policy: DimensionPolicy) -> Self {
        Self {
            policy,
            priority: Vec::new(),
            decoders: OnceCell::new(),
        }
    }

    /// Register an external adapter (a JPEG decoder, say) that is consulted
    /// before the built-in ones. Must be called before the first lookup.
    pub fn with_priority_decoder(mut self, factory: DecoderFactory) -> Self {
        self.priority.push(factory);
        // adapters built by an earlier lookup no longer reflect the order
        self.decoders = OnceCell::new();
        self
    }

    pub fn policy(&self) -> DimensionPolicy {
        self.policy
    }

    // concurrent first lookups block until one thread has built the list
    fn decoders(&self) -> &[Box<dyn ImageDecoder>] {
        self.decoders.get_or_init(|| {
            let all: Vec<Box<dyn ImageDecoder>> = self
                .priority
                .iter()
                .chain(BUILTIN)
                .map(|factory| factory(self.policy))
                .collect();
            log::info!("dec: image decoder registry initialized ({} decoders)", all.len());
            all
        })
    }

    /// Decoder for `path`, chosen by its extension.
    pub fn decoder(&self, path: &str) -> Option<&dyn ImageDecoder> {
        let ext = extension_of(path);
        let found = self
            .decoders()
            .iter()
            .find(|d| d.supports_format(&ext))
            .map(|d| &**d);
        if found.is_none() {
            log::warn!("dec: no decoder found for image: {}", path);
        }
        found
    }

    pub fn is_format_supported(&self, path: &str) -> bool {
        self.decoder(path).is_some()
    }

    /// Extensions of every decoder, in lookup order.
    pub fn supported_formats(&self) -> Vec<&'static str> {
        self.decoders()
            .iter()
            .flat_map(|d| d.extensions().iter().copied())
            .collect()
    }

    /// Look up a decoder and run it; `false` if none matches or the decode
    /// fails.
    pub fn decode_to_framebuffer(
        &self,
        storage: &mut dyn Storage,
        path: &str,
        renderer: &mut dyn Renderer,
        config: &RenderConfig,
    ) -> bool {
        match self.decoder(path) {
            Some(decoder) => decoder.decode_to_framebuffer(storage, path, renderer, config),
            None => false,
        }
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new(DimensionPolicy::default())
    }
}

/// Lowercase extension of the last path segment, without the dot; empty
/// when there is none.
pub fn extension_of(path: &str) -> String {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match name.rfind('.') {
        Some(dot) => name[dot + 1..].to_ascii_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extensions() {
        assert_eq!(extension_of("/img/Cover.PNG"), "png");
        assert_eq!(extension_of("a.tar.gz"), "gz");
        assert_eq!(extension_of("noext"), "");
        assert_eq!(extension_of("/dir.d/noext"), "");
        assert_eq!(extension_of("trailing."), "");
    }

    #[test]
    fn builtin_png_lookup() {
        let reg = DecoderRegistry::default();
        assert_eq!(reg.decoder("x.png").map(|d| d.format_name()), Some("PNG"));
        assert!(reg.is_format_supported("X.PnG"));
        assert!(!reg.is_format_supported("x.gif"));
        assert!(!reg.is_format_supported("png"));
        assert_eq!(reg.supported_formats(), ["png"]);
    }

    #[test]
    fn registry_is_shareable() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<DecoderRegistry>();
        assert_sync::<Box<dyn ImageDecoder>>();
    }
}
