//! Names and fixed values shared across the crate.
//!
//! Property names, node types and file names mirror the content-repository
//! conventions that library folders and components are authored with. Keeping
//! them here means the index builder, the resolver and the event classifier
//! agree on exactly one spelling of each.

/// Property listing the categories a library folder answers to.
pub const PROP_CATEGORIES: &str = "categories";

/// Property listing categories a library (or component) depends on.
pub const PROP_DEPENDENCIES: &str = "dependencies";

/// Property listing ordering-only dependencies of a library.
pub const PROP_CONDITIONAL_DEPENDENCIES: &str = "conditionalDependencies";

/// Property listing embedded categories (library) or embed descriptors (component).
pub const PROP_EMBED: &str = "embed";

/// Property listing composite run-mode strings.
pub const PROP_RUN_MODES: &str = "runModes";

/// Property listing the brands a library belongs to.
pub const PROP_BRANDS: &str = "brands";

/// Every property whose change alters a library definition.
pub const LIBRARY_DEFINITION_PROPERTIES: [&str; 6] = [
    PROP_CATEGORIES,
    PROP_DEPENDENCIES,
    PROP_CONDITIONAL_DEPENDENCIES,
    PROP_EMBED,
    PROP_RUN_MODES,
    PROP_BRANDS,
];

/// Resource type of a content node.
pub const PROP_RESOURCE_TYPE: &str = "sling:resourceType";

/// Resource super type of a component or content node.
pub const PROP_RESOURCE_SUPER_TYPE: &str = "sling:resourceSuperType";

/// Node type property as stored in property files.
pub const PROP_PRIMARY_TYPE: &str = "jcr:primaryType";

/// Binary/text payload of a file node.
pub const PROP_DATA: &str = "jcr:data";

/// Node type of a library folder.
pub const LIBRARY_FOLDER_TYPE: &str = "cq:ClientLibraryFolder";

/// Node type of a component definition.
pub const COMPONENT_TYPE: &str = "cq:Component";

/// Node type of a file.
pub const FILE_TYPE: &str = "nt:file";

/// Node type assigned to nodes without an explicit type.
pub const UNSTRUCTURED_TYPE: &str = "nt:unstructured";

/// Name of the container child that holds a page's (or file's) content.
pub const CONTAINER_NODE: &str = "jcr:content";

/// Include file listing a library's CSS/LESS/Sass sources.
pub const CSS_INCLUDE_FILE: &str = "css.txt";

/// Include file listing a library's JS sources.
pub const JS_INCLUDE_FILE: &str = "js.txt";

/// Include-file directive that sets the base directory of following entries.
pub const INCLUDE_BASE_DIRECTIVE: &str = "#base=";

/// Brand used when a request names none.
pub const DEFAULT_BRAND: &str = "default";

/// Separator between run-mode tokens inside one composite run-mode string.
pub const RUN_MODE_DELIMITER: char = '.';

/// Separator between relative path and resource type in an embed descriptor.
pub const EMBED_DESCRIPTOR_DELIMITER: char = ':';

/// Name of the property file read by the filesystem content tree.
pub const NODE_PROPERTIES_FILE: &str = ".content.toml";

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "pagelib.toml";

/// File name used for a cached bundle inside its key directory.
pub const CACHED_LIBRARY_FILE: &str = "library";
