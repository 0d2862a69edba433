//! NL-004: Parameter template resolution.
//!
//! Replaces every literal occurrence of each bound token in a parameter
//! document. One left-to-right scan; at each position the longest token
//! matching there wins, and replacement text is never re-scanned, so the
//! result does not depend on token order. Unbound placeholder-shaped text
//! and tokens that never occur are both left alone.
//!
//! The resolved document is a new file named by the BLAKE3 hash of its
//! content; the source document is never touched.

use super::context::LaunchContext;
use super::error::{LaunchError, LaunchResult};
use super::types::{ParamTemplate, Substitution};
use crate::provenance::hasher;
use indexmap::IndexMap;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Hex digits of the content hash kept in resolved file names.
const NAME_HASH_LEN: usize = 16;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[A-Za-z_][A-Za-z0-9_]*>").unwrap_or_else(|e| panic!("placeholder regex: {e}"))
});

/// A parameter document with all bound tokens replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDocument {
    /// Template id
    pub template: String,
    /// Unresolved source document
    pub source: PathBuf,
    /// Newly written resolved document
    pub path: PathBuf,
    /// `blake3:{hex}` of the resolved content
    pub hash: String,
    /// token -> number of occurrences replaced
    pub occurrences: IndexMap<String, usize>,
}

impl ParamTemplate {
    pub fn new(source: Substitution) -> Self {
        Self {
            source,
            replacements: IndexMap::new(),
        }
    }

    /// Bind `token` to a replacement. Tokens are unique within a template.
    pub fn bind(mut self, token: &str, replacement: Substitution) -> LaunchResult<Self> {
        if self.replacements.contains_key(token) {
            return Err(LaunchError::DuplicateToken(token.to_string()));
        }
        self.replacements.insert(token.to_string(), replacement);
        Ok(self)
    }
}

/// Replace every occurrence of each token in `text`.
pub fn replace_tokens(text: &str, replacements: &IndexMap<String, String>) -> String {
    replace_tokens_counted(text, replacements).0
}

/// Like [`replace_tokens`], also reporting how often each token was replaced.
pub fn replace_tokens_counted(
    text: &str,
    replacements: &IndexMap<String, String>,
) -> (String, IndexMap<String, usize>) {
    let mut counts: IndexMap<String, usize> =
        replacements.keys().map(|t| (t.clone(), 0)).collect();

    let mut tokens: Vec<(&str, &str)> = replacements
        .iter()
        .filter(|(t, _)| !t.is_empty())
        .map(|(t, v)| (t.as_str(), v.as_str()))
        .collect();
    // Longest first so overlapping tokens resolve the same way regardless of order.
    tokens.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

    let mut first_bytes: Vec<u8> = tokens.iter().map(|(t, _)| t.as_bytes()[0]).collect();
    first_bytes.sort_unstable();
    first_bytes.dedup();

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    // A token's first byte is never a UTF-8 continuation byte, so every
    // candidate index is a char boundary.
    while let Some(i) = rest.bytes().position(|b| first_bytes.binary_search(&b).is_ok()) {
        out.push_str(&rest[..i]);
        rest = &rest[i..];
        match tokens.iter().find(|(t, _)| rest.starts_with(t)) {
            Some((token, value)) => {
                out.push_str(value);
                rest = &rest[token.len()..];
                if let Some(n) = counts.get_mut(*token) {
                    *n += 1;
                }
            }
            None => {
                let ch_len = rest.chars().next().map_or(1, char::len_utf8);
                out.push_str(&rest[..ch_len]);
                rest = &rest[ch_len..];
            }
        }
    }
    out.push_str(rest);

    (out, counts)
}

/// Placeholder-shaped substrings (`<identifier>`) in first-seen order.
pub fn placeholders(text: &str) -> Vec<&str> {
    let mut found: Vec<&str> = Vec::new();
    for m in PLACEHOLDER.find_iter(text) {
        if !found.contains(&m.as_str()) {
            found.push(m.as_str());
        }
    }
    found
}

/// Resolve a template against the context and write the resolved document.
pub fn resolve_template(
    id: &str,
    template: &ParamTemplate,
    ctx: &mut LaunchContext,
) -> LaunchResult<ResolvedDocument> {
    let source = PathBuf::from(ctx.evaluate(&template.source)?);
    let text = std::fs::read_to_string(&source).map_err(|e| LaunchError::document(&source, e))?;

    let mut bound = IndexMap::new();
    for (token, replacement) in &template.replacements {
        if token.is_empty() {
            return Err(LaunchError::EmptyToken(id.to_string()));
        }
        bound.insert(token.clone(), ctx.evaluate(replacement)?);
    }

    let (resolved, occurrences) = replace_tokens_counted(&text, &bound);
    for (token, n) in &occurrences {
        if *n == 0 {
            tracing::debug!(template = id, token = %token, "token not present in document");
        }
    }
    let leftover = placeholders(&resolved);
    if !leftover.is_empty() {
        tracing::debug!(template = id, placeholders = ?leftover, "unbound placeholders left as-is");
    }

    let hash = hasher::hash_string(&resolved);
    let path = write_resolved(ctx.document_dir(), &source, &resolved, &hash)?;
    tracing::info!(
        template = id,
        source = %source.display(),
        path = %path.display(),
        "resolved parameter document"
    );

    Ok(ResolvedDocument {
        template: id.to_string(),
        source,
        path,
        hash,
        occurrences,
    })
}

/// `<stem>.<hash>.<ext>` inside `dir`.
pub fn resolved_file_name(source: &Path, hash: &str) -> String {
    let hex = hash.strip_prefix("blake3:").unwrap_or(hash);
    let short = &hex[..hex.len().min(NAME_HASH_LEN)];
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "params".to_string());
    match source.extension() {
        Some(ext) => format!("{}.{}.{}", stem, short, ext.to_string_lossy()),
        None => format!("{}.{}", stem, short),
    }
}

/// Write atomically (temp + rename); an identical existing file is reused.
fn write_resolved(dir: &Path, source: &Path, content: &str, hash: &str) -> LaunchResult<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| LaunchError::document(dir, e))?;
    let path = dir.join(resolved_file_name(source, hash));

    if let Ok(existing) = std::fs::read_to_string(&path) {
        if existing == content {
            return Ok(path);
        }
    }

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, content).map_err(|e| LaunchError::document(&tmp_path, e))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| LaunchError::document(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LaunchArgument;
    use crate::runtime::packages::PackageIndex;
    use proptest::prelude::*;

    fn map(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_nl004_replace_all_occurrences() {
        let doc = "inflation: <robot_radius>\nfootprint: <robot_radius>\n";
        let out = replace_tokens(doc, &map(&[("<robot_radius>", "0.3")]));
        assert_eq!(out, "inflation: 0.3\nfootprint: 0.3\n");
    }

    #[test]
    fn test_nl004_absent_token_is_noop() {
        let doc = "width: 50\n";
        let (out, counts) = replace_tokens_counted(doc, &map(&[("<global_costmap_width>", "80")]));
        assert_eq!(out, doc);
        assert_eq!(counts["<global_costmap_width>"], 0);
    }

    #[test]
    fn test_nl004_unbound_placeholder_untouched() {
        let doc = "ns: <robot_namespace>\nrange: <raytrace_range>\n";
        let out = replace_tokens(doc, &map(&[("<raytrace_range>", "30.0")]));
        assert_eq!(out, "ns: <robot_namespace>\nrange: 30.0\n");
        assert_eq!(placeholders(&out), vec!["<robot_namespace>"]);
    }

    #[test]
    fn test_nl004_replacement_not_rescanned() {
        let doc = "a: <a>\nb: <b>\n";
        let out = replace_tokens(doc, &map(&[("<a>", "<b>"), ("<b>", "x")]));
        assert_eq!(out, "a: <b>\nb: x\n");
        let out = replace_tokens(doc, &map(&[("<b>", "x"), ("<a>", "<b>")]));
        assert_eq!(out, "a: <b>\nb: x\n");
    }

    #[test]
    fn test_nl004_longest_match_wins() {
        let doc = "<origin_x> <origin>";
        let out = replace_tokens(doc, &map(&[("<origin", "O"), ("<origin_x>", "-25")]));
        assert_eq!(out, "-25 O>");
    }

    #[test]
    fn test_nl004_multibyte_text() {
        let doc = "name: \"Ø<robot_namespace>é\"";
        let out = replace_tokens(doc, &map(&[("<robot_namespace>", "robot0")]));
        assert_eq!(out, "name: \"Ørobot0é\"");
    }

    #[test]
    fn test_nl004_empty_token_ignored_by_scan() {
        let out = replace_tokens("abc", &map(&[("", "x")]));
        assert_eq!(out, "abc");
    }

    #[test]
    fn test_nl004_bind_duplicate_token() {
        let t = ParamTemplate::new(Substitution::arg("params_file"))
            .bind("<robot_radius>", Substitution::arg("robot_radius"))
            .unwrap();
        let err = t
            .bind("<robot_radius>", Substitution::text("0.5"))
            .unwrap_err();
        assert!(matches!(err, LaunchError::DuplicateToken(ref t) if t == "<robot_radius>"));
    }

    #[test]
    fn test_nl004_resolved_file_name() {
        let name = resolved_file_name(Path::new("/opt/nav2_params.yaml"), "blake3:0123456789abcdef0123");
        assert_eq!(name, "nav2_params.0123456789abcdef.yaml");
        let name = resolved_file_name(Path::new("/opt/params"), "blake3:ab");
        assert_eq!(name, "params.ab");
    }

    fn fixture(dir: &Path, doc: &str) -> (LaunchContext, ParamTemplate, PathBuf) {
        let source = dir.join("nav2_params.yaml");
        std::fs::write(&source, doc).unwrap();
        let mut ctx = LaunchContext::new(
            IndexMap::from([
                ("params_file".to_string(), source.display().to_string()),
                ("raytrace_range".to_string(), "30.0".to_string()),
            ]),
            PackageIndex::default(),
            dir.join("documents"),
        );
        ctx.bind(&LaunchArgument::required("params_file", "")).unwrap();
        ctx.bind(&LaunchArgument::required("raytrace_range", "")).unwrap();
        let template = ParamTemplate::new(Substitution::arg("params_file"))
            .bind(
                "<raytrace_range>",
                Substitution::concat(vec![Substitution::text(""), Substitution::arg("raytrace_range")]),
            )
            .unwrap()
            .bind("<bt_nav_to_pose_xml_path>", Substitution::text("/bt/to_pose.xml"))
            .unwrap();
        (ctx, template, source)
    }

    #[test]
    fn test_nl004_resolve_template_writes_new_document() {
        let dir = tempfile::tempdir().unwrap();
        let doc = "obstacle_layer:\n  raytrace_max_range: <raytrace_range>\nbt: <bt_nav_to_pose_xml_path>\n";
        let (mut ctx, template, source) = fixture(dir.path(), doc);

        let resolved = resolve_template("params", &template, &mut ctx).unwrap();
        assert_ne!(resolved.path, source);
        assert!(resolved.path.starts_with(dir.path().join("documents")));
        assert_eq!(
            std::fs::read_to_string(&resolved.path).unwrap(),
            "obstacle_layer:\n  raytrace_max_range: 30.0\nbt: /bt/to_pose.xml\n"
        );
        // source untouched
        assert_eq!(std::fs::read_to_string(&source).unwrap(), doc);
        assert_eq!(resolved.occurrences["<raytrace_range>"], 1);
        assert!(resolved.hash.starts_with("blake3:"));
    }

    #[test]
    fn test_nl004_resolve_template_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (mut ctx, template, _) = fixture(dir.path(), "r: <raytrace_range>\n");
        let a = resolve_template("params", &template, &mut ctx).unwrap();
        let b = resolve_template("params", &template, &mut ctx).unwrap();
        assert_eq!(a, b);
        let files = std::fs::read_dir(dir.path().join("documents")).unwrap().count();
        assert_eq!(files, 1);
    }

    #[test]
    fn test_nl004_resolve_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let (mut ctx, _, _) = fixture(dir.path(), "");
        let template = ParamTemplate::new(Substitution::text("/nonexistent/params.yaml"));
        let err = resolve_template("params", &template, &mut ctx).unwrap_err();
        assert!(matches!(err, LaunchError::Document { .. }));
    }

    #[test]
    fn test_nl004_resolve_empty_token_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut ctx, mut template, _) = fixture(dir.path(), "x");
        template
            .replacements
            .insert(String::new(), Substitution::text("y"));
        let err = resolve_template("params", &template, &mut ctx).unwrap_err();
        assert!(matches!(err, LaunchError::EmptyToken(_)));
    }

    proptest! {
        #[test]
        fn prop_nl004_resolution_is_deterministic(
            doc in "[a-z <>_:\n]{0,80}",
            value in "[a-z0-9.]{0,6}",
        ) {
            let r = map(&[("<robot_radius>", value.as_str()), ("<raytrace_range>", "30.0")]);
            prop_assert_eq!(replace_tokens(&doc, &r), replace_tokens(&doc, &r));
        }

        #[test]
        fn prop_nl004_absent_tokens_are_noop(doc in "[a-z :\n]{0,80}") {
            // documents without '<' cannot contain any of these tokens
            let r = map(&[("<robot_radius>", "0.3"), ("<global_costmap_width>", "50")]);
            prop_assert_eq!(replace_tokens(&doc, &r), doc);
        }

        #[test]
        fn prop_nl004_order_independent(doc in "[ab<>x ]{0,60}") {
            let forward = map(&[("<a>", "<b>"), ("<b>", "x"), ("<ab>", "y")]);
            let reverse = map(&[("<ab>", "y"), ("<b>", "x"), ("<a>", "<b>")]);
            prop_assert_eq!(replace_tokens(&doc, &forward), replace_tokens(&doc, &reverse));
        }

        #[test]
        fn prop_nl004_unknown_placeholders_survive(name in "[a-z_]{1,12}") {
            prop_assume!(name != "robot_radius");
            let placeholder = format!("<{}>", name);
            let doc = format!("k: {}\nr: <robot_radius>\n", placeholder);
            let out = replace_tokens(&doc, &map(&[("<robot_radius>", "0.3")]));
            prop_assert!(out.contains(&placeholder));
            prop_assert!(out.contains("r: 0.3"));
        }
    }
}
