// Import resolution against the set of package modules
//
// Every import is classified as:
// - Package (an edge in the import graph)
// - External (stdlib or third-party, recorded as a dependency)
// - Unresolved (a relative import pointing outside the package)

use crate::parser::{Import, ImportKind, ParsedModule};
use std::collections::HashSet;

/// Top-level names of the Python 3 standard library
const STDLIB_MODULES: &[&str] = &[
    "abc", "aifc", "argparse", "array", "ast", "asynchat", "asyncio",
    "asyncore", "atexit", "audioop", "base64", "bdb", "binascii",
    "binhex", "bisect", "builtins", "bz2", "calendar", "cgi", "cgitb",
    "chunk", "cmath", "cmd", "code", "codecs", "codeop", "collections",
    "colorsys", "compileall", "concurrent", "configparser", "contextlib",
    "contextvars", "copy", "copyreg", "cProfile", "crypt", "csv",
    "ctypes", "curses", "dataclasses", "datetime", "dbm", "decimal",
    "difflib", "dis", "distutils", "doctest", "email", "encodings",
    "enum", "errno", "faulthandler", "fcntl", "filecmp", "fileinput",
    "fnmatch", "fractions", "ftplib", "functools", "gc", "getopt",
    "getpass", "gettext", "glob", "graphlib", "grp", "gzip", "hashlib",
    "heapq", "hmac", "html", "http", "idlelib", "imaplib", "imghdr",
    "imp", "importlib", "inspect", "io", "ipaddress", "itertools",
    "json", "keyword", "lib2to3", "linecache", "locale", "logging",
    "lzma", "mailbox", "mailcap", "marshal", "math", "mimetypes",
    "mmap", "modulefinder", "multiprocessing", "netrc", "nis",
    "nntplib", "numbers", "operator", "optparse", "os", "ossaudiodev",
    "pathlib", "pdb", "pickle", "pickletools", "pipes", "pkgutil",
    "platform", "plistlib", "poplib", "posix", "posixpath", "pprint",
    "profile", "pstats", "pty", "pwd", "py_compile", "pyclbr",
    "pydoc", "queue", "quopri", "random", "re", "readline", "reprlib",
    "resource", "rlcompleter", "runpy", "sched", "secrets", "select",
    "selectors", "shelve", "shlex", "shutil", "signal", "site",
    "smtpd", "smtplib", "sndhdr", "socket", "socketserver", "spwd",
    "sqlite3", "ssl", "stat", "statistics", "string", "stringprep",
    "struct", "subprocess", "sunau", "symtable", "sys", "sysconfig",
    "syslog", "tabnanny", "tarfile", "telnetlib", "tempfile", "termios",
    "test", "textwrap", "threading", "time", "timeit", "tkinter",
    "token", "tokenize", "tomllib", "trace", "traceback", "tracemalloc",
    "tty", "turtle", "turtledemo", "types", "typing", "unicodedata",
    "unittest", "urllib", "uu", "uuid", "venv", "warnings", "wave",
    "weakref", "webbrowser", "winreg", "winsound", "wsgiref", "xdrlib",
    "xml", "xmlrpc", "zipapp", "zipfile", "zipimport", "zlib", "zoneinfo",
    "_thread", "__future__",
];

/// Check a dotted name's top-level segment against the standard library
pub fn is_stdlib_module(module: &str) -> bool {
    let top_level = module.split('.').next().unwrap_or(module);
    STDLIB_MODULES.contains(&top_level)
}

/// Where an import leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    /// A module of the analyzed package
    Package(String),
    /// A module outside the package, by top-level name
    External { name: String, stdlib: bool },
    /// A relative import that climbs out of the package or names nothing
    Unresolved(String),
}

/// Resolves imports to package modules or external dependencies
pub struct ImportResolver {
    modules: HashSet<String>,
    stdlib_modules: HashSet<&'static str>,
}

impl ImportResolver {
    /// Create a resolver over the qualified names of all package modules
    pub fn new<I, S>(modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            modules: modules.into_iter().map(Into::into).collect(),
            stdlib_modules: STDLIB_MODULES.iter().copied().collect(),
        }
    }

    /// Check if a module name is from the standard library
    pub fn is_stdlib(&self, module: &str) -> bool {
        let top_level = module.split('.').next().unwrap_or(module);
        self.stdlib_modules.contains(top_level)
    }

    pub fn is_package_module(&self, module: &str) -> bool {
        self.modules.contains(module)
    }

    /// Absolute dotted name an import's module part refers to.
    ///
    /// Relative imports are resolved against the importer's package;
    /// `None` when they climb above the top level.
    pub fn absolute_module(import: &Import, importer: &ParsedModule) -> Option<String> {
        let ImportKind::Relative { level } = import.kind else {
            return Some(import.module.clone());
        };

        let mut base: Vec<&str> = importer
            .package()
            .split('.')
            .filter(|s| !s.is_empty())
            .collect();
        for _ in 1..level {
            base.pop()?;
        }
        if base.is_empty() {
            return None;
        }

        let mut module = base.join(".");
        if !import.module.is_empty() {
            module.push('.');
            module.push_str(&import.module);
        }
        Some(module)
    }

    /// Modules an import makes the importer depend on
    pub fn resolve(&self, import: &Import, importer: &ParsedModule) -> Vec<ImportTarget> {
        let Some(module) = Self::absolute_module(import, importer) else {
            return vec![ImportTarget::Unresolved(render_relative(import))];
        };

        match import.kind {
            ImportKind::Direct | ImportKind::Dynamic => {
                vec![self.longest_package_prefix(&module).map_or_else(
                    || self.external(&module),
                    ImportTarget::Package,
                )]
            }
            ImportKind::From | ImportKind::Relative { .. } => {
                let mut targets = Vec::new();
                for name in &import.names {
                    let submodule = format!("{}.{}", module, name.name);
                    let target = if name.name != "*" && self.is_package_module(&submodule) {
                        ImportTarget::Package(submodule)
                    } else if self.is_package_module(&module) {
                        ImportTarget::Package(module.clone())
                    } else if import.kind.is_relative() {
                        ImportTarget::Unresolved(render_relative(import))
                    } else {
                        self.external(&module)
                    };
                    if !targets.contains(&target) {
                        targets.push(target);
                    }
                }
                if targets.is_empty() {
                    targets.push(self.external(&module));
                }
                targets
            }
        }
    }

    /// Names an import binds in the importer's namespace, with the dotted
    /// path each refers to. Wildcards bind `*` to the source module.
    pub fn bindings(import: &Import, importer: &ParsedModule) -> Vec<(String, String)> {
        let Some(module) = Self::absolute_module(import, importer) else {
            return Vec::new();
        };

        match import.kind {
            ImportKind::Dynamic => Vec::new(),
            ImportKind::Direct => import
                .names
                .iter()
                .map(|name| match &name.alias {
                    Some(alias) => (alias.clone(), name.name.clone()),
                    None => {
                        let top = name.name.split('.').next().unwrap_or(&name.name);
                        (top.to_string(), top.to_string())
                    }
                })
                .collect(),
            ImportKind::From | ImportKind::Relative { .. } => import
                .names
                .iter()
                .map(|name| {
                    if name.name == "*" {
                        ("*".to_string(), module.clone())
                    } else {
                        (
                            name.used_name().to_string(),
                            format!("{}.{}", module, name.name),
                        )
                    }
                })
                .collect(),
        }
    }

    fn longest_package_prefix(&self, module: &str) -> Option<String> {
        let parts: Vec<&str> = module.split('.').collect();
        (1..=parts.len())
            .rev()
            .map(|n| parts[..n].join("."))
            .find(|candidate| self.is_package_module(candidate))
    }

    fn external(&self, module: &str) -> ImportTarget {
        let name = module.split('.').next().unwrap_or(module).to_string();
        ImportTarget::External {
            stdlib: self.is_stdlib(&name),
            name,
        }
    }
}

fn render_relative(import: &Import) -> String {
    match import.kind {
        ImportKind::Relative { level } => format!("{}{}", ".".repeat(level), import.module),
        _ => import.module.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ImportedName;
    use std::path::PathBuf;

    fn importer(name: &str, is_package: bool) -> ParsedModule {
        ParsedModule::new(name, PathBuf::from("x.py"), is_package)
    }

    fn resolver() -> ImportResolver {
        ImportResolver::new(["shapes", "shapes.core", "shapes.util", "shapes.util.geometry"])
    }

    #[test]
    fn test_stdlib_detection() {
        let resolver = resolver();
        assert!(resolver.is_stdlib("os"));
        assert!(resolver.is_stdlib("os.path"));
        assert!(resolver.is_stdlib("collections.abc"));
        assert!(resolver.is_stdlib("typing"));
        assert!(!resolver.is_stdlib("numpy"));
        assert!(!resolver.is_stdlib("requests"));
    }

    #[test]
    fn test_absolute_module_relative_levels() {
        let module = importer("shapes.util.geometry", false);
        let one = Import::relative("", vec![ImportedName::new("x")], 1, 1);
        let two = Import::relative("core", vec![ImportedName::new("x")], 2, 1);
        let three = Import::relative("", vec![ImportedName::new("x")], 3, 1);
        assert_eq!(ImportResolver::absolute_module(&one, &module).as_deref(), Some("shapes.util"));
        assert_eq!(ImportResolver::absolute_module(&two, &module).as_deref(), Some("shapes.core"));
        assert_eq!(ImportResolver::absolute_module(&three, &module), None);
    }

    #[test]
    fn test_relative_from_package_init() {
        let init = importer("shapes", true);
        let import = Import::relative("core", vec![ImportedName::new("Widget")], 1, 1);
        assert_eq!(
            resolver().resolve(&import, &init),
            vec![ImportTarget::Package("shapes.core".to_string())]
        );
    }

    #[test]
    fn test_from_import_targets_submodule() {
        let module = importer("shapes.core", false);
        let import = Import::from_import(
            "shapes.util",
            vec![ImportedName::new("geometry"), ImportedName::new("helper")],
            1,
        );
        assert_eq!(
            resolver().resolve(&import, &module),
            vec![
                ImportTarget::Package("shapes.util.geometry".to_string()),
                ImportTarget::Package("shapes.util".to_string()),
            ]
        );
    }

    #[test]
    fn test_direct_import_uses_longest_prefix() {
        let module = importer("shapes.core", false);
        let import = Import::simple("shapes.util.geometry.Point", 1);
        assert_eq!(
            resolver().resolve(&import, &module),
            vec![ImportTarget::Package("shapes.util.geometry".to_string())]
        );
    }

    #[test]
    fn test_external_imports() {
        let module = importer("shapes.core", false);
        assert_eq!(
            resolver().resolve(&Import::simple("os.path", 1), &module),
            vec![ImportTarget::External {
                name: "os".to_string(),
                stdlib: true
            }]
        );
        let numpy = Import::from_import("numpy.linalg", vec![ImportedName::new("norm")], 1);
        assert_eq!(
            resolver().resolve(&numpy, &module),
            vec![ImportTarget::External {
                name: "numpy".to_string(),
                stdlib: false
            }]
        );
    }

    #[test]
    fn test_unresolved_relative() {
        let module = importer("shapes.core", false);
        let import = Import::relative("missing", vec![ImportedName::new("x")], 1, 1);
        assert_eq!(
            resolver().resolve(&import, &module),
            vec![ImportTarget::Unresolved(".missing".to_string())]
        );
        let above = Import::relative("", vec![ImportedName::new("x")], 3, 1);
        assert_eq!(
            resolver().resolve(&above, &module),
            vec![ImportTarget::Unresolved("...".to_string())]
        );
    }

    #[test]
    fn test_bindings() {
        let module = importer("shapes.core", false);
        let direct = Import::simple("os.path", 1);
        assert_eq!(
            ImportResolver::bindings(&direct, &module),
            vec![("os".to_string(), "os".to_string())]
        );

        let mut aliased = Import::simple("numpy", 1);
        aliased.names = vec![ImportedName::with_alias("numpy", "np")];
        assert_eq!(
            ImportResolver::bindings(&aliased, &module),
            vec![("np".to_string(), "numpy".to_string())]
        );

        let relative = Import::relative(
            "util",
            vec![ImportedName::with_alias("helper", "h"), ImportedName::new("*")],
            1,
            1,
        );
        assert_eq!(
            ImportResolver::bindings(&relative, &module),
            vec![
                ("h".to_string(), "shapes.util.helper".to_string()),
                ("*".to_string(), "shapes.util".to_string()),
            ]
        );
    }
}
