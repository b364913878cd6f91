//! Typed identities and search parameters of catalog tree items.

use std::fmt;

use crate::model::Item;

/// Type keys of the catalog regions.
pub mod type_keys {
    pub const TAG_NAME: &str = "tag_name";
    pub const DATA_ARTIFACT: &str = "data_artifact";
    pub const DELETED_CONTENT: &str = "deleted_content";
    pub const FILE_SIZE: &str = "file_size";
    pub const FILE_EXTENSION: &str = "file_extension";
    pub const MIME_TYPE: &str = "mime_type";
    pub const ANALYSIS_RESULT: &str = "analysis_result";
    pub const FILE_SYSTEM: &str = "file_system";
}

/// A catalog tree item.
pub type CatalogItem = Item<CatalogId, CatalogParams>;

/// Deleted-content views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeletedContentFilter {
    /// Files the file system marks as deleted.
    FileSystem,
    /// Every deleted file, including carved ones.
    All,
}

impl DeletedContentFilter {
    pub const ALL: [Self; 2] = [Self::FileSystem, Self::All];

    pub fn id(self) -> i32 {
        match self {
            Self::FileSystem => 0,
            Self::All => 1,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::FileSystem => "File System",
            Self::All => "All",
        }
    }
}

/// File size buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileSizeFilter {
    Size50To200Mb,
    Size200MbTo1Gb,
    Size1GbPlus,
}

const MB: u64 = 1024 * 1024;

impl FileSizeFilter {
    pub const ALL: [Self; 3] = [Self::Size50To200Mb, Self::Size200MbTo1Gb, Self::Size1GbPlus];

    pub fn id(self) -> i32 {
        match self {
            Self::Size50To200Mb => 0,
            Self::Size200MbTo1Gb => 1,
            Self::Size1GbPlus => 2,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Size50To200Mb => "50 - 200MB",
            Self::Size200MbTo1Gb => "200MB - 1GB",
            Self::Size1GbPlus => "1GB+",
        }
    }

    /// Inclusive lower bound in bytes.
    pub fn min_bound(self) -> u64 {
        match self {
            Self::Size50To200Mb => 50 * MB,
            Self::Size200MbTo1Gb => 200 * MB,
            Self::Size1GbPlus => 1000 * MB,
        }
    }

    /// Exclusive upper bound in bytes; `None` is unbounded.
    pub fn max_bound(self) -> Option<u64> {
        match self {
            Self::Size50To200Mb => Some(200 * MB),
            Self::Size200MbTo1Gb => Some(1000 * MB),
            Self::Size1GbPlus => None,
        }
    }

    pub fn contains(self, size: u64) -> bool {
        size >= self.min_bound() && self.max_bound().is_none_or(|max| size < max)
    }
}

/// File extension groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExtensionFilter {
    Images,
    Videos,
    Audio,
    Archives,
    Databases,
    Documents,
    Executables,
}

impl ExtensionFilter {
    pub const ALL: [Self; 7] = [
        Self::Images,
        Self::Videos,
        Self::Audio,
        Self::Archives,
        Self::Databases,
        Self::Documents,
        Self::Executables,
    ];

    pub fn id(self) -> i32 {
        match self {
            Self::Images => 0,
            Self::Videos => 1,
            Self::Audio => 2,
            Self::Archives => 3,
            Self::Databases => 4,
            Self::Documents => 5,
            Self::Executables => 6,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Images => "Images",
            Self::Videos => "Videos",
            Self::Audio => "Audio",
            Self::Archives => "Archives",
            Self::Databases => "Databases",
            Self::Documents => "Documents",
            Self::Executables => "Executable",
        }
    }

    /// Lowercase extensions with a leading dot.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Images => &[
                ".jpg", ".jpeg", ".png", ".psd", ".nef", ".tiff", ".tif", ".bmp", ".gif", ".heic",
                ".webp",
            ],
            Self::Videos => &[
                ".aaf", ".3gp", ".asf", ".avi", ".m1v", ".m2v", ".m4v", ".mp4", ".mov", ".mpeg",
                ".mpg", ".mkv", ".wmv", ".webm", ".flv",
            ],
            Self::Audio => &[
                ".aiff", ".aif", ".flac", ".wav", ".m4a", ".ape", ".wma", ".mp2", ".mp1", ".mp3",
                ".aac", ".ogg", ".opus",
            ],
            Self::Archives => &[
                ".zip", ".rar", ".7zip", ".7z", ".arj", ".tar", ".gzip", ".gz", ".bzip", ".bz2",
                ".tgz", ".cab", ".xz",
            ],
            Self::Databases => &[".db", ".db3", ".sqlite", ".sqlite3"],
            Self::Documents => &[
                ".htm", ".html", ".doc", ".docx", ".odt", ".xls", ".xlsx", ".ppt", ".pptx",
                ".pdf", ".txt", ".rtf",
            ],
            Self::Executables => &[".exe", ".dll", ".bat", ".cmd", ".com"],
        }
    }

    /// Returns `true` if `extension` (with or without the leading dot, any
    /// case) belongs to this group.
    pub fn matches(self, extension: &str) -> bool {
        let normalized = format!(".{}", extension.trim_start_matches('.').to_lowercase());
        self.extensions().contains(&normalized.as_str())
    }
}

/// File system metadata types, by their on-disk value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMetaType {
    Undefined,
    Regular,
    Directory,
    Fifo,
    CharDevice,
    BlockDevice,
    Link,
    Shadow,
    Socket,
    Whiteout,
    Virtual,
    VirtualDirectory,
}

impl FileMetaType {
    pub fn value(self) -> i16 {
        match self {
            Self::Undefined => 0,
            Self::Regular => 1,
            Self::Directory => 2,
            Self::Fifo => 3,
            Self::CharDevice => 4,
            Self::BlockDevice => 5,
            Self::Link => 6,
            Self::Shadow => 7,
            Self::Socket => 8,
            Self::Whiteout => 9,
            Self::Virtual => 10,
            Self::VirtualDirectory => 11,
        }
    }
}

/// What a file system tree item stands for; decides how it is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Image,
    Volume,
    Pool,
    Directory,
    LocalDirectory,
    LocalFilesDataSource,
    VirtualDirectory,
    File,
    Unsupported,
}

impl ContentKind {
    /// Returns `true` for kinds that may appear as a data source root.
    pub fn is_data_source(self) -> bool {
        matches!(self, Self::Image | Self::LocalFilesDataSource)
    }
}

/// The identity of a catalog item among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CatalogId {
    TagName(i64),
    ArtifactType(i64),
    DeletedContent(DeletedContentFilter),
    FileSize(FileSizeFilter),
    FileExtension(ExtensionFilter),
    MimeType(String),
    AnalysisType(i64),
    /// A file system object, by content object id.
    Content(i64),
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TagName(id) => write!(f, "tag:{id}"),
            Self::ArtifactType(id) => write!(f, "artifact:{id}"),
            Self::DeletedContent(filter) => write!(f, "deleted:{}", filter.id()),
            Self::FileSize(filter) => write!(f, "size:{}", filter.id()),
            Self::FileExtension(filter) => write!(f, "ext:{}", filter.id()),
            Self::MimeType(mime) => write!(f, "mime:{mime}"),
            Self::AnalysisType(id) => write!(f, "analysis:{id}"),
            Self::Content(id) => write!(f, "content:{id}"),
        }
    }
}

/// The search parameters a catalog item stands for, used both as tree
/// payload and as the query of its result pages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CatalogParams {
    TagName {
        tag_name_id: i64,
        data_source_id: Option<i64>,
    },
    ArtifactType {
        artifact_type_id: i64,
        data_source_id: Option<i64>,
    },
    DeletedContent {
        filter: DeletedContentFilter,
        data_source_id: Option<i64>,
    },
    FileSize {
        filter: FileSizeFilter,
        data_source_id: Option<i64>,
    },
    FileExtension {
        filter: ExtensionFilter,
        data_source_id: Option<i64>,
    },
    MimeType {
        mime_type: String,
        data_source_id: Option<i64>,
    },
    AnalysisResult {
        analysis_type_id: i64,
        data_source_id: Option<i64>,
    },
    /// One object of the file system tree.
    FileSystem {
        content_object_id: i64,
        kind: ContentKind,
        meta_type: Option<FileMetaType>,
        data_source_id: Option<i64>,
    },
}

impl CatalogParams {
    pub fn type_key(&self) -> &'static str {
        match self {
            Self::TagName { .. } => type_keys::TAG_NAME,
            Self::ArtifactType { .. } => type_keys::DATA_ARTIFACT,
            Self::DeletedContent { .. } => type_keys::DELETED_CONTENT,
            Self::FileSize { .. } => type_keys::FILE_SIZE,
            Self::FileExtension { .. } => type_keys::FILE_EXTENSION,
            Self::MimeType { .. } => type_keys::MIME_TYPE,
            Self::AnalysisResult { .. } => type_keys::ANALYSIS_RESULT,
            Self::FileSystem { .. } => type_keys::FILE_SYSTEM,
        }
    }

    pub fn data_source_id(&self) -> Option<i64> {
        match self {
            Self::TagName { data_source_id, .. }
            | Self::ArtifactType { data_source_id, .. }
            | Self::DeletedContent { data_source_id, .. }
            | Self::FileSize { data_source_id, .. }
            | Self::FileExtension { data_source_id, .. }
            | Self::MimeType { data_source_id, .. }
            | Self::AnalysisResult { data_source_id, .. }
            | Self::FileSystem { data_source_id, .. } => *data_source_id,
        }
    }

    /// The identity of the tree item these parameters describe.
    pub fn id(&self) -> CatalogId {
        match self {
            Self::TagName { tag_name_id, .. } => CatalogId::TagName(*tag_name_id),
            Self::ArtifactType { artifact_type_id, .. } => CatalogId::ArtifactType(*artifact_type_id),
            Self::DeletedContent { filter, .. } => CatalogId::DeletedContent(*filter),
            Self::FileSize { filter, .. } => CatalogId::FileSize(*filter),
            Self::FileExtension { filter, .. } => CatalogId::FileExtension(*filter),
            Self::MimeType { mime_type, .. } => CatalogId::MimeType(mime_type.clone()),
            Self::AnalysisResult { analysis_type_id, .. } => CatalogId::AnalysisType(*analysis_type_id),
            Self::FileSystem { content_object_id, .. } => CatalogId::Content(*content_object_id),
        }
    }

    /// The same parameters restricted to `data_source_id`.
    pub fn scoped_to(&self, data_source_id: Option<i64>) -> Self {
        let mut scoped = self.clone();
        match &mut scoped {
            Self::TagName { data_source_id: ds, .. }
            | Self::ArtifactType { data_source_id: ds, .. }
            | Self::DeletedContent { data_source_id: ds, .. }
            | Self::FileSize { data_source_id: ds, .. }
            | Self::FileExtension { data_source_id: ds, .. }
            | Self::MimeType { data_source_id: ds, .. }
            | Self::AnalysisResult { data_source_id: ds, .. }
            | Self::FileSystem { data_source_id: ds, .. } => *ds = data_source_id,
        }
        scoped
    }

    /// The metadata type of a file system item.
    pub fn meta_type(&self) -> Option<FileMetaType> {
        match self {
            Self::FileSystem { meta_type, .. } => *meta_type,
            _ => None,
        }
    }

    /// Builds the tree item for these parameters.
    pub fn into_item(self, display_name: impl Into<String>) -> CatalogItem {
        let id = self.id();
        let type_key = self.type_key();
        Item::new(id, type_key, self, display_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_bounds() {
        assert!(!FileSizeFilter::Size50To200Mb.contains(49 * MB));
        assert!(FileSizeFilter::Size50To200Mb.contains(50 * MB));
        assert!(!FileSizeFilter::Size50To200Mb.contains(200 * MB));
        assert!(FileSizeFilter::Size200MbTo1Gb.contains(200 * MB));
        assert!(FileSizeFilter::Size1GbPlus.contains(u64::MAX));
    }

    #[test]
    fn test_extension_matching_is_normalized() {
        assert!(ExtensionFilter::Images.matches("JPG"));
        assert!(ExtensionFilter::Images.matches(".png"));
        assert!(!ExtensionFilter::Images.matches("pdf"));
        assert!(ExtensionFilter::Documents.matches("pdf"));
    }

    #[test]
    fn test_filter_order_follows_ids() {
        let mut filters = ExtensionFilter::ALL.to_vec();
        filters.reverse();
        filters.sort();
        assert_eq!(filters.iter().map(|f| f.id()).collect::<Vec<_>>(), (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_params_identity_and_scope() {
        let params = CatalogParams::MimeType {
            mime_type: "image/png".into(),
            data_source_id: Some(3),
        };
        assert_eq!(params.id(), CatalogId::MimeType("image/png".into()));
        assert_eq!(params.type_key(), type_keys::MIME_TYPE);
        assert_eq!(params.scoped_to(None).data_source_id(), None);

        let item = params.into_item("image/png");
        assert_eq!(item.type_key, type_keys::MIME_TYPE);
        assert_eq!(item.id.to_string(), "mime:image/png");
    }

    #[test]
    fn test_file_system_params() {
        let params = CatalogParams::FileSystem {
            content_object_id: 42,
            kind: ContentKind::Directory,
            meta_type: Some(FileMetaType::Directory),
            data_source_id: Some(1),
        };
        assert_eq!(params.id(), CatalogId::Content(42));
        assert_eq!(params.type_key(), type_keys::FILE_SYSTEM);
        assert_eq!(params.meta_type().map(FileMetaType::value), Some(2));
        assert!(!ContentKind::Directory.is_data_source());
        assert!(ContentKind::Image.is_data_source());
    }
}
