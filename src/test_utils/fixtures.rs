//! Sample content repositories.
//!
//! Both fixtures describe the same site:
//!
//! | Path | Kind | Declares |
//! |---|---|---|
//! | `/libs/vendor` | library | `vendor`; `vendor.js` |
//! | `/libs/base` | library | `base`, embeds `vendor`; `base.css`, `base.js` |
//! | `/apps/site/clientlibs` | library | `site`, depends on `base`; `site.less`, `site.js` |
//! | `/apps/site/clientlibs/author` | library | `site.author`, run mode `author`; `author.css` |
//! | `/apps/site/clientlibs/brand-x` | library | `site`, brand `x`; `x.css` |
//! | `/apps/site/components/page` | component | `site`, embeds `header:site/components/header` |
//! | `/apps/site/components/header` | component | `site.author` |
//! | `/content/home/jcr:content` | page content | `site/components/page` |
//! | `/content/about/jcr:content` | page content | `foundation/text` only |

use std::fs;
use std::path::Path;

use crate::constants::{COMPONENT_TYPE, LIBRARY_FOLDER_TYPE};
use crate::content::{ContentNode, MemoryContentTree};

/// In-memory sample site.
pub fn sample_site() -> MemoryContentTree {
    MemoryContentTree::new()
        .with(ContentNode::new("/libs/vendor", LIBRARY_FOLDER_TYPE).with_property("categories", ["vendor"]))
        .with_file("/libs/vendor/js.txt", "vendor.js")
        .with_file("/libs/vendor/vendor.js", "var vendor = 1;")
        .with(
            ContentNode::new("/libs/base", LIBRARY_FOLDER_TYPE)
                .with_property("categories", ["base"])
                .with_property("embed", ["vendor"]),
        )
        .with_file("/libs/base/css.txt", "base.css")
        .with_file("/libs/base/js.txt", "base.js")
        .with_file("/libs/base/base.css", "body { margin: 0; }")
        .with_file("/libs/base/base.js", "var base = 1;")
        .with(
            ContentNode::new("/apps/site/clientlibs", LIBRARY_FOLDER_TYPE)
                .with_property("categories", ["site"])
                .with_property("dependencies", ["base"]),
        )
        .with_file("/apps/site/clientlibs/css.txt", "site.less")
        .with_file("/apps/site/clientlibs/js.txt", "site.js")
        .with_file("/apps/site/clientlibs/site.less", ".site { color: red; }")
        .with_file("/apps/site/clientlibs/site.js", "var site = 1;")
        .with(
            ContentNode::new("/apps/site/clientlibs/author", LIBRARY_FOLDER_TYPE)
                .with_property("categories", ["site.author"])
                .with_property("runModes", ["author"]),
        )
        .with_file("/apps/site/clientlibs/author/css.txt", "author.css")
        .with_file("/apps/site/clientlibs/author/author.css", ".author {}")
        .with(
            ContentNode::new("/apps/site/clientlibs/brand-x", LIBRARY_FOLDER_TYPE)
                .with_property("categories", ["site"])
                .with_property("brands", ["x"]),
        )
        .with_file("/apps/site/clientlibs/brand-x/css.txt", "x.css")
        .with_file("/apps/site/clientlibs/brand-x/x.css", ".x {}")
        .with(
            ContentNode::new("/apps/site/components/page", COMPONENT_TYPE)
                .with_property("dependencies", ["site"])
                .with_property("embed", ["header:site/components/header"]),
        )
        .with(
            ContentNode::new("/apps/site/components/header", COMPONENT_TYPE)
                .with_property("dependencies", ["site.author"]),
        )
        .with(
            ContentNode::new("/content/home/jcr:content", "cq:PageContent")
                .with_property("sling:resourceType", "site/components/page"),
        )
        .with(
            ContentNode::new("/content/about/jcr:content", "cq:PageContent")
                .with_property("sling:resourceType", "foundation/text"),
        )
}

/// Write the sample site as a directory tree under `root`.
pub fn write_sample_site(root: &Path) -> std::io::Result<()> {
    let folder = |path: &str, properties: &str| -> std::io::Result<()> {
        let dir = root.join(path);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(".content.toml"), properties)
    };
    let file = |path: &str, text: &str| -> std::io::Result<()> {
        let path = root.join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)
    };

    folder(
        "libs/vendor",
        "\"jcr:primaryType\" = \"cq:ClientLibraryFolder\"\ncategories = [\"vendor\"]\n",
    )?;
    file("libs/vendor/js.txt", "vendor.js\n")?;
    file("libs/vendor/vendor.js", "var vendor = 1;")?;

    folder(
        "libs/base",
        "\"jcr:primaryType\" = \"cq:ClientLibraryFolder\"\ncategories = [\"base\"]\nembed = [\"vendor\"]\n",
    )?;
    file("libs/base/css.txt", "base.css\n")?;
    file("libs/base/js.txt", "base.js\n")?;
    file("libs/base/base.css", "body { margin: 0; }")?;
    file("libs/base/base.js", "var base = 1;")?;

    folder(
        "apps/site/clientlibs",
        "\"jcr:primaryType\" = \"cq:ClientLibraryFolder\"\ncategories = [\"site\"]\ndependencies = [\"base\"]\n",
    )?;
    file("apps/site/clientlibs/css.txt", "site.less\n")?;
    file("apps/site/clientlibs/js.txt", "site.js\n")?;
    file("apps/site/clientlibs/site.less", ".site { color: red; }")?;
    file("apps/site/clientlibs/site.js", "var site = 1;")?;

    folder(
        "apps/site/clientlibs/author",
        "\"jcr:primaryType\" = \"cq:ClientLibraryFolder\"\ncategories = [\"site.author\"]\nrunModes = [\"author\"]\n",
    )?;
    file("apps/site/clientlibs/author/css.txt", "author.css\n")?;
    file("apps/site/clientlibs/author/author.css", ".author {}")?;

    folder(
        "apps/site/clientlibs/brand-x",
        "\"jcr:primaryType\" = \"cq:ClientLibraryFolder\"\ncategories = [\"site\"]\nbrands = [\"x\"]\n",
    )?;
    file("apps/site/clientlibs/brand-x/css.txt", "x.css\n")?;
    file("apps/site/clientlibs/brand-x/x.css", ".x {}")?;

    folder(
        "apps/site/components/page",
        "\"jcr:primaryType\" = \"cq:Component\"\ndependencies = [\"site\"]\nembed = [\"header:site/components/header\"]\n",
    )?;
    folder(
        "apps/site/components/header",
        "\"jcr:primaryType\" = \"cq:Component\"\ndependencies = [\"site.author\"]\n",
    )?;

    folder(
        "content/home/jcr:content",
        "\"jcr:primaryType\" = \"cq:PageContent\"\n\"sling:resourceType\" = \"site/components/page\"\n",
    )?;
    folder(
        "content/about/jcr:content",
        "\"jcr:primaryType\" = \"cq:PageContent\"\n\"sling:resourceType\" = \"foundation/text\"\n",
    )?;
    Ok(())
}
