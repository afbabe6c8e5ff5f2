use std::io::{Read, Seek, Write};

use crate::asset::{Asset, Namespaces};
use crate::foundation::error::{MadamError, MadamResult};

/// Seekable byte source handed to codecs.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Codec translating between raw bytes and an [`Asset`] for one family of formats.
pub trait Processor: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Probe whether `stream` holds content this processor can read.
    ///
    /// Implementations may consume the stream freely; [`crate::Registry`] restores the position
    /// after every probe.
    fn can_read(&self, stream: &mut dyn ReadSeek) -> bool;

    /// Decode `stream` into an asset carrying base metadata such as dimensions or duration.
    fn read(&self, stream: &mut dyn ReadSeek) -> MadamResult<Asset>;

    fn can_write(&self, asset: &Asset) -> bool {
        let _ = asset;
        false
    }

    /// Serialize `asset` to `out`.
    fn write(&self, asset: &Asset, out: &mut dyn Write) -> MadamResult<()> {
        let _ = out;
        Err(MadamError::unsupported(format!(
            "{} cannot write {}",
            self.name(),
            asset.mime_type()
        )))
    }
}

/// Codec moving one or more metadata namespaces in and out of an essence.
pub trait MetadataProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Namespace names this codec handles.
    fn formats(&self) -> &'static [&'static str];

    /// Extract the namespaces present in `stream`.
    fn read(&self, stream: &mut dyn ReadSeek) -> MadamResult<Namespaces>;

    /// Essence bytes with every namespace of this codec removed.
    fn strip(&self, stream: &mut dyn ReadSeek) -> MadamResult<Vec<u8>>;

    /// Essence bytes with `metadata` embedded. Unknown namespaces fail with
    /// [`MadamError::UnsupportedFormat`].
    fn combine(&self, stream: &mut dyn ReadSeek, metadata: &Namespaces) -> MadamResult<Vec<u8>>;
}
