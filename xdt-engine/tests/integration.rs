use xdt_dom::{Document, LoadOptions, QName, TransformableDocument};
use xdt_engine::{
    registry, CollectingLogger, ConditionLocator, DefaultLocator, Error, Locator, LocatorBinding,
    MatchLocator, NamedTypeRegistry, Result, StaticModuleLoader, Transform, TransformContext,
    TransformationBuilder, TypeModule, XPathLocator,
};
use xdt_traits::{ArgumentBound, TypeKind, TRANSFORM_NAMESPACE};

const WEB_CONFIG: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<configuration>
  <appSettings>
    <add key="a" value="1"/>
    <add key="b" value="2"/>
  </appSettings>
  <system.web>
    <compilation debug="true"
                 targetFramework="4.8" />
  </system.web>
</configuration>
"#;

const COMPILATION: &str = "<compilation debug=\"true\"\n                 targetFramework=\"4.8\" />";

/// Wrap instructions in a transform root; the body starts on line 2
fn xdt(body: &str) -> String {
    format!(
        "<configuration xmlns:xdt=\"{}\">\n{}\n</configuration>",
        TRANSFORM_NAMESPACE, body
    )
}

fn run_with(builder: TransformationBuilder, source: &str, transform: &str) -> (String, bool) {
    let mut transformation = builder.from_str(transform).unwrap();
    let document = Document::parse_str(source, &LoadOptions::preserving()).unwrap();
    let mut target = TransformableDocument::new(document);
    let succeeded = transformation.apply(&mut target);
    (target.to_xml_string(), succeeded)
}

fn run(source: &str, transform: &str) -> (String, bool, CollectingLogger) {
    let logger = CollectingLogger::new();
    let builder = TransformationBuilder::new().logger(logger.clone());
    let (output, succeeded) = run_with(builder, source, transform);
    (output, succeeded, logger)
}

fn messages(diagnostics: &[xdt_traits::Diagnostic]) -> Vec<String> {
    diagnostics.iter().map(|d| d.message.clone()).collect()
}

// ====== Attribute transforms ======

#[test]
fn test_match_locator_sets_attributes_on_selected_element() {
    let transform = xdt(
        r#"  <appSettings>
    <add key="b" value="two" xdt:Transform="SetAttributes" xdt:Locator="Match(key)"/>
  </appSettings>"#,
    );
    let (output, succeeded, logger) = run(WEB_CONFIG, &transform);
    assert!(succeeded);
    assert!(logger.warnings().is_empty());
    let expected = WEB_CONFIG.replace(r#"<add key="b" value="2"/>"#, r#"<add key="b" value="two"/>"#);
    assert_eq!(output, expected);
}

#[test]
fn test_remove_attributes_keeps_remaining_layout() {
    let transform = xdt(
        r#"  <system.web>
    <compilation xdt:Transform="RemoveAttributes(debug)"/>
  </system.web>"#,
    );
    let (output, succeeded, _) = run(WEB_CONFIG, &transform);
    assert!(succeeded);
    let expected = WEB_CONFIG.replace(COMPILATION, r#"<compilation targetFramework="4.8" />"#);
    assert_eq!(output, expected);
}

#[test]
fn test_set_attributes_adds_on_its_own_line_in_multiline_tag() {
    let transform = xdt(
        r#"  <system.web>
    <compilation batch="false" xdt:Transform="SetAttributes"/>
  </system.web>"#,
    );
    let (output, _, _) = run(WEB_CONFIG, &transform);
    let expected = WEB_CONFIG.replace(
        COMPILATION,
        "<compilation debug=\"true\"\n                 targetFramework=\"4.8\"\n                 batch=\"false\" />",
    );
    assert_eq!(output, expected);
}

#[test]
fn test_set_attributes_appends_to_single_line_tag() {
    let transform = xdt(
        r#"  <appSettings>
    <add key="a" extra="x" xdt:Transform="SetAttributes(extra)" xdt:Locator="Match(key)"/>
  </appSettings>"#,
    );
    let (output, _, _) = run(WEB_CONFIG, &transform);
    let expected = WEB_CONFIG.replace(
        r#"<add key="a" value="1"/>"#,
        r#"<add key="a" value="1" extra="x"/>"#,
    );
    assert_eq!(output, expected);
}

#[test]
fn test_remove_all_attributes_then_add_one() {
    let transform = xdt(
        r#"  <appSettings>
    <add key="a" xdt:Transform="RemoveAttributes" xdt:Locator="Match(key)"/>
    <add name="n" xdt:Transform="SetAttributes" xdt:Locator="XPath(/configuration/appSettings/add[1])"/>
  </appSettings>"#,
    );
    let (output, succeeded, _) = run(WEB_CONFIG, &transform);
    assert!(succeeded);
    let expected = WEB_CONFIG.replace(r#"<add key="a" value="1"/>"#, r#"<add name="n"/>"#);
    assert_eq!(output, expected);
}

#[test]
fn test_condition_locator_applies_to_every_match() {
    let transform = xdt(
        r#"  <appSettings>
    <add value="z" xdt:Transform="SetAttributes(value)" xdt:Locator="Condition(@key='a' or @key='b')"/>
  </appSettings>"#,
    );
    let (output, succeeded, _) = run(WEB_CONFIG, &transform);
    assert!(succeeded);
    let expected = WEB_CONFIG
        .replace(r#"<add key="a" value="1"/>"#, r#"<add key="a" value="z"/>"#)
        .replace(r#"<add key="b" value="2"/>"#, r#"<add key="b" value="z"/>"#);
    assert_eq!(output, expected);
}

#[test]
fn test_unmatched_attribute_argument_warns() {
    let transform = xdt(
        r#"  <system.web>
    <compilation xdt:Transform="RemoveAttributes(missing)"/>
  </system.web>"#,
    );
    let (output, succeeded, logger) = run(WEB_CONFIG, &transform);
    assert!(succeeded);
    assert_eq!(output, WEB_CONFIG);
    assert_eq!(
        messages(&logger.warnings()),
        vec![
            "Argument 'missing' did not match any attributes".to_string(),
            "No attributes found to remove".to_string(),
        ]
    );
}

// ====== Element transforms ======

#[test]
fn test_insert_and_insert_if_missing() {
    let transform = xdt(
        r#"  <appSettings>
    <add key="c" value="3" xdt:Transform="Insert"/>
    <add key="a" value="x" xdt:Transform="InsertIfMissing" xdt:Locator="Match(key)"/>
    <add key="d" value="4" xdt:Transform="InsertIfMissing" xdt:Locator="Match(key)"/>
  </appSettings>"#,
    );
    let (output, succeeded, _) = run(WEB_CONFIG, &transform);
    assert!(succeeded);
    let expected = WEB_CONFIG.replace(
        "    <add key=\"b\" value=\"2\"/>\n",
        "    <add key=\"b\" value=\"2\"/>\n    <add key=\"c\" value=\"3\" />\n    <add key=\"d\" value=\"4\" />\n",
    );
    assert_eq!(output, expected);
}

#[test]
fn test_insert_before_and_after_siblings() {
    let transform = xdt(
        r#"  <appSettings>
    <add key="first" xdt:Transform="InsertBefore(/configuration/appSettings/add[@key='a'])"/>
    <add key="last" xdt:Transform="InsertAfter(/configuration/appSettings/add[@key='b'])"/>
  </appSettings>"#,
    );
    let (output, succeeded, _) = run(WEB_CONFIG, &transform);
    assert!(succeeded);
    let expected = WEB_CONFIG
        .replace(
            "    <add key=\"a\" value=\"1\"/>\n",
            "    <add key=\"first\" />\n    <add key=\"a\" value=\"1\"/>\n",
        )
        .replace(
            "    <add key=\"b\" value=\"2\"/>\n",
            "    <add key=\"b\" value=\"2\"/>\n    <add key=\"last\" />\n",
        );
    assert_eq!(output, expected);
}

#[test]
fn test_insert_before_requires_one_argument() {
    let transform = xdt(
        r#"  <appSettings>
    <add key="first" xdt:Transform="InsertBefore"/>
  </appSettings>"#,
    );
    let (output, succeeded, logger) = run(WEB_CONFIG, &transform);
    assert!(!succeeded);
    assert_eq!(output, WEB_CONFIG);
    assert_eq!(
        messages(&logger.errors()),
        vec!["InsertBefore requires exactly 1 argument".to_string()]
    );
}

#[test]
fn test_replace_with_absolute_xpath() {
    let transform = xdt(
        r#"  <system.web>
    <compilation debug="false" xdt:Transform="Replace" xdt:Locator="XPath(/configuration/system.web/compilation)"/>
  </system.web>"#,
    );
    let (output, succeeded, _) = run(WEB_CONFIG, &transform);
    assert!(succeeded);
    assert_eq!(output, WEB_CONFIG.replace(COMPILATION, r#"<compilation debug="false" />"#));
}

#[test]
fn test_relative_xpath_reaches_another_branch() {
    let transform = xdt(
        r#"  <system.web>
    <compilation xdt:Transform="Remove" xdt:Locator="XPath(../../appSettings/add[@key='a'])"/>
  </system.web>"#,
    );
    let (output, succeeded, _) = run(WEB_CONFIG, &transform);
    assert!(succeeded);
    assert_eq!(output, WEB_CONFIG.replace(r#"<add key="a" value="1"/>"#, ""));
}

#[test]
fn test_remove_all_removes_every_match() {
    let transform = xdt(
        r#"  <appSettings>
    <add xdt:Transform="RemoveAll"/>
  </appSettings>"#,
    );
    let (output, succeeded, _) = run(WEB_CONFIG, &transform);
    assert!(succeeded);
    let expected = WEB_CONFIG
        .replace(r#"<add key="a" value="1"/>"#, "")
        .replace(r#"<add key="b" value="2"/>"#, "");
    assert_eq!(output, expected);
}

#[test]
fn test_transform_without_arguments_warns_when_given_some() {
    let transform = xdt(
        r#"  <appSettings>
    <add key="a" xdt:Transform="Remove(extra)" xdt:Locator="Match(key)"/>
  </appSettings>"#,
    );
    let (output, succeeded, logger) = run(WEB_CONFIG, &transform);
    assert!(succeeded);
    assert_eq!(output, WEB_CONFIG.replace(r#"<add key="a" value="1"/>"#, ""));
    assert_eq!(
        messages(&logger.warnings()),
        vec!["Remove does not expect arguments; ignoring".to_string()]
    );
}

// ====== Missing targets ======

#[test]
fn test_second_remove_reports_target_removed_earlier() {
    let transform = xdt(
        r#"  <appSettings>
    <add key="a" xdt:Transform="Remove" xdt:Locator="Match(key)"/>
    <add key="a" xdt:Transform="Remove" xdt:Locator="Match(key)"/>
  </appSettings>"#,
    );
    let (_, succeeded, logger) = run(WEB_CONFIG, &transform);
    assert!(succeeded);
    let warnings = logger.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].message,
        "Target '/configuration/appSettings/add[@key='a']' matched the source document before transforms ran, but the matching elements were removed"
    );
    assert_eq!(warnings[0].line, Some(4));
    assert_eq!(warnings[0].column, Some(6));
}

#[test]
fn test_insert_under_missing_parent_is_an_error() {
    let transform = xdt(
        r#"  <missing>
    <add key="x" xdt:Transform="Insert"/>
  </missing>"#,
    );
    let (output, succeeded, logger) = run(WEB_CONFIG, &transform);
    assert!(!succeeded);
    assert_eq!(output, WEB_CONFIG);
    let errors = logger.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].message,
        "No element in the source document matches '/configuration/missing/add'"
    );
    assert_eq!(errors[0].line, Some(3));
    assert!(logger.log_text().contains("Not executing Insert (transform line 3, position 18)"));
}

#[test]
fn test_missing_target_of_remove_is_a_warning() {
    let transform = xdt(
        r#"  <appSettings>
    <add key="zzz" xdt:Transform="Remove" xdt:Locator="Match(key)"/>
  </appSettings>"#,
    );
    let (output, succeeded, logger) = run(WEB_CONFIG, &transform);
    assert!(succeeded);
    assert_eq!(output, WEB_CONFIG);
    assert_eq!(
        messages(&logger.warnings()),
        vec!["No element in the source document matches '/configuration/appSettings/add[@key='zzz']'".to_string()]
    );
}

#[test]
fn test_suppress_warnings_on_instruction() {
    let transform = xdt(
        r#"  <appSettings>
    <add key="zzz" xdt:Transform="Remove" xdt:Locator="Match(key)" xdt:SupressWarnings="true"/>
  </appSettings>"#,
    );
    let (_, succeeded, logger) = run(WEB_CONFIG, &transform);
    assert!(succeeded);
    assert!(logger.warnings().is_empty());
    assert!(logger
        .log_text()
        .contains("No element in the source document matches '/configuration/appSettings/add[@key='zzz']'"));
}

#[test]
fn test_suppress_warnings_covers_subtree() {
    let transform = xdt(
        r#"  <appSettings xdt:SupressWarnings="True">
    <add key="zzz" xdt:Transform="Remove" xdt:Locator="Match(key)"/>
    <add key="yyy" xdt:Transform="Remove" xdt:Locator="Match(key)"/>
  </appSettings>
  <system.web>
    <pages xdt:Transform="Remove"/>
  </system.web>"#,
    );
    let (_, succeeded, logger) = run(WEB_CONFIG, &transform);
    assert!(succeeded);
    assert_eq!(
        messages(&logger.warnings()),
        vec!["No element in the source document matches '/configuration/system.web/pages'".to_string()]
    );
}

#[test]
fn test_invalid_suppress_warnings_value_is_an_error() {
    let transform = xdt(
        r#"  <appSettings>
    <add key="a" xdt:Transform="Remove" xdt:Locator="Match(key)" xdt:SupressWarnings="maybe"/>
  </appSettings>"#,
    );
    let (output, succeeded, logger) = run(WEB_CONFIG, &transform);
    assert!(!succeeded);
    assert_eq!(output, WEB_CONFIG);
    assert_eq!(
        messages(&logger.errors()),
        vec!["'maybe' is not a valid boolean value".to_string()]
    );
}

// ====== Resolution errors ======

fn single_error(transform_attribute: &str) -> (bool, Vec<String>) {
    let transform = xdt(&format!(
        "  <appSettings>\n    <add key=\"a\" {}/>\n  </appSettings>",
        transform_attribute
    ));
    let (output, succeeded, logger) = run(WEB_CONFIG, &transform);
    assert_eq!(output, WEB_CONFIG);
    (succeeded, messages(&logger.errors()))
}

#[test]
fn test_unknown_transform_name() {
    let (succeeded, errors) = single_error(r#"xdt:Transform="Frobnicate""#);
    assert!(!succeeded);
    assert_eq!(errors, vec!["Could not resolve 'Frobnicate' as a type of Transform".to_string()]);
}

#[test]
fn test_abstract_transform_is_not_constructible() {
    let (succeeded, errors) = single_error(r#"xdt:Transform="Transform""#);
    assert!(!succeeded);
    assert_eq!(errors, vec!["Type 'Transform' has no usable constructor".to_string()]);
}

#[test]
fn test_locator_used_as_transform() {
    let (succeeded, errors) = single_error(r#"xdt:Transform="Match(key)""#);
    assert!(!succeeded);
    assert_eq!(errors, vec!["Type 'Match' is a Locator, not a Transform".to_string()]);
}

#[test]
fn test_match_on_absent_attribute() {
    let (succeeded, errors) = single_error(r#"xdt:Transform="Remove" xdt:Locator="Match(nokey)""#);
    assert!(!succeeded);
    assert_eq!(errors, vec!["No attribute 'nokey' exists for the Match locator".to_string()]);
}

#[test]
fn test_malformed_directive() {
    let (succeeded, errors) = single_error(r#"xdt:Transform="Remove(a""#);
    assert!(!succeeded);
    assert_eq!(errors, vec!["Could not parse 'Remove(a' as a directive value".to_string()]);
}

#[test]
fn test_resolution_error_is_reported_at_transform_attribute() {
    let logger = CollectingLogger::new();
    let transform = xdt("  <appSettings>\n    <add key=\"a\" xdt:Transform=\"Frobnicate\"/>\n  </appSettings>");
    run_with(TransformationBuilder::new().logger(logger.clone()), WEB_CONFIG, &transform);
    let errors = logger.errors();
    assert_eq!(errors[0].line, Some(3));
    assert_eq!(errors[0].column, Some(18));
}

#[test]
fn test_unresolved_parent_still_walks_children() {
    let transform = xdt(
        r#"  <appSettings xdt:Transform="Frobnicate">
    <add key="a" xdt:Transform="Remove" xdt:Locator="Match(key)"/>
  </appSettings>"#,
    );
    let (output, succeeded, logger) = run(WEB_CONFIG, &transform);
    assert!(!succeeded);
    assert_eq!(
        messages(&logger.errors()),
        vec!["Could not resolve 'Frobnicate' as a type of Transform".to_string()]
    );
    assert_eq!(output, WEB_CONFIG.replace(r#"<add key="a" value="1"/>"#, ""));
}

#[test]
fn test_invalid_suppress_warnings_on_parent_keeps_inherited_setting() {
    let transform = xdt(
        r#"  <appSettings xdt:SupressWarnings="maybe">
    <add key="zzz" xdt:Transform="Remove" xdt:Locator="Match(key)"/>
    <add key="b" xdt:Transform="Remove" xdt:Locator="Match(key)"/>
  </appSettings>"#,
    );
    let (output, succeeded, logger) = run(WEB_CONFIG, &transform);
    assert!(!succeeded);
    assert_eq!(
        messages(&logger.errors()),
        vec!["'maybe' is not a valid boolean value".to_string()]
    );
    assert_eq!(
        messages(&logger.warnings()),
        vec!["No element in the source document matches '/configuration/appSettings/add[@key='zzz']'".to_string()]
    );
    assert_eq!(output, WEB_CONFIG.replace(r#"<add key="b" value="2"/>"#, ""));
}

#[test]
fn test_xpath_locator_selecting_an_attribute_is_an_error() {
    let transform = xdt(
        r#"  <appSettings>
    <add xdt:Transform="Remove" xdt:Locator="XPath(/configuration/appSettings/add[1]/@key)"/>
  </appSettings>"#,
    );
    let (output, succeeded, logger) = run(WEB_CONFIG, &transform);
    assert!(!succeeded);
    assert_eq!(output, WEB_CONFIG);
    let errors = messages(&logger.errors());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("selects attributes"), "{}", errors[0]);
}

// ====== Logging ======

#[test]
fn test_log_text_of_successful_remove() {
    let transform = xdt(
        r#"  <appSettings>
    <add key="a" xdt:Transform="Remove" xdt:Locator="Match(key)"/>
  </appSettings>"#,
    );
    let (_, _, logger) = run(WEB_CONFIG, &transform);
    let expected = "Executing Remove (transform line 3, position 18)\n\
                    \x20 on /configuration/appSettings/add[@key='a']\n\
                    \x20 Applying to 'add' element (source line 4, position 6)\n\
                    \x20 Removed 'add' element\n\
                    Done executing Remove\n";
    assert_eq!(logger.log_text(), expected);
}

#[test]
fn test_unknown_tag_in_transform_namespace_warns() {
    let logger = CollectingLogger::new();
    let transform = xdt("  <xdt:Bogus/>");
    TransformationBuilder::new().logger(logger.clone()).from_str(&transform).unwrap();
    let warnings = logger.warnings();
    assert_eq!(messages(&warnings), vec!["Unknown tag 'xdt:Bogus'".to_string()]);
    assert_eq!(warnings[0].line, Some(2));
}

#[test]
fn test_transform_without_namespace_changes_nothing() {
    let (output, succeeded, logger) = run(
        WEB_CONFIG,
        "<configuration>\n  <appSettings/>\n</configuration>",
    );
    assert!(succeeded);
    assert_eq!(output, WEB_CONFIG);
    assert!(logger.log_text().contains(&format!(
        "The expected namespace {} was not found in the transform file",
        TRANSFORM_NAMESPACE
    )));
}

#[test]
fn test_transformation_can_be_applied_twice() {
    let logger = CollectingLogger::new();
    let transform = xdt(
        r#"  <appSettings>
    <add key="a" xdt:Transform="Remove" xdt:Locator="Match(key)"/>
  </appSettings>"#,
    );
    let mut transformation = TransformationBuilder::new()
        .logger(logger.clone())
        .from_str(&transform)
        .unwrap();
    for _ in 0..2 {
        let document = Document::parse_str(WEB_CONFIG, &LoadOptions::preserving()).unwrap();
        let (mut document, succeeded) = transformation.apply_to_document(document);
        assert!(succeeded);
        assert_eq!(
            document.to_xml_string(),
            WEB_CONFIG.replace(r#"<add key="a" value="1"/>"#, "")
        );
    }
    assert!(logger.warnings().is_empty());
}

// ====== Namespaces ======

#[test]
fn test_default_namespace_targets() {
    let source = "<configuration xmlns=\"urn:app\">\n  <item name=\"a\" value=\"1\"/>\n</configuration>";
    let transform = format!(
        "<configuration xmlns=\"urn:app\" xmlns:xdt=\"{}\">\n  <item name=\"a\" value=\"2\" xdt:Transform=\"SetAttributes(value)\" xdt:Locator=\"Match(name)\"/>\n</configuration>",
        TRANSFORM_NAMESPACE
    );
    let (output, succeeded, logger) = run(source, &transform);
    assert!(succeeded, "{}", logger.log_text());
    assert_eq!(output, source.replace("value=\"1\"", "value=\"2\""));
}

// ====== Import ======

#[derive(Debug, Default)]
struct MarkDone;

impl Transform for MarkDone {
    fn apply_to_all_targets(&self) -> bool {
        true
    }

    fn apply(&self, context: &mut TransformContext<'_>) -> Result<()> {
        context.expect_no_arguments();
        let target = context.target_node();
        context.document_mut().set_attribute(target, QName::local("done"), "true")
    }
}

fn acme_module() -> TypeModule {
    TypeModule::new().with_transform("Acme.Transforms", "MarkDone", registry::transform::<MarkDone>)
}

#[test]
fn test_imported_module_provides_transform() {
    let logger = CollectingLogger::new();
    let builder = TransformationBuilder::new()
        .logger(logger.clone())
        .module_loader(StaticModuleLoader::new().with_module("Acme", acme_module()));
    let transform = xdt(
        r#"  <xdt:Import assembly="Acme" namespace="Acme.Transforms"/>
  <appSettings>
    <add key="a" xdt:Transform="MarkDone" xdt:Locator="Match(key)"/>
  </appSettings>"#,
    );
    let (output, succeeded) = run_with(builder, WEB_CONFIG, &transform);
    assert!(succeeded, "{}", logger.log_text());
    assert_eq!(
        output,
        WEB_CONFIG.replace(r#"<add key="a" value="1"/>"#, r#"<add key="a" value="1" done="true"/>"#)
    );
}

#[test]
fn test_importing_builtin_module_again_is_harmless() {
    let transform = xdt(
        r#"  <xdt:Import assembly="Microsoft.Web.XmlTransform" namespace="Microsoft.Web.XmlTransform"/>
  <appSettings>
    <add key="a" xdt:Transform="Remove" xdt:Locator="Match(key)"/>
  </appSettings>"#,
    );
    let (_, succeeded, logger) = run(WEB_CONFIG, &transform);
    assert!(succeeded, "{}", logger.log_text());
}

#[test]
fn test_same_name_in_two_namespaces_is_ambiguous() {
    let other = TypeModule::new().with_transform("Other", "Remove", registry::transform::<MarkDone>);
    let logger = CollectingLogger::new();
    let builder = TransformationBuilder::new()
        .logger(logger.clone())
        .module_loader(StaticModuleLoader::new().with_module("Other", other));
    let transform = xdt(
        r#"  <xdt:Import assembly="Other" namespace="Other"/>
  <appSettings>
    <add key="a" xdt:Transform="Remove" xdt:Locator="Match(key)"/>
  </appSettings>"#,
    );
    let (output, succeeded) = run_with(builder, WEB_CONFIG, &transform);
    assert!(!succeeded);
    assert_eq!(output, WEB_CONFIG);
    assert_eq!(
        messages(&logger.errors()),
        vec!["Type 'Remove' was found in more than one registered namespace".to_string()]
    );
}

#[test]
fn test_import_with_assembly_and_path_fails_to_load() {
    let logger = CollectingLogger::new();
    let transform = xdt(r#"  <xdt:Import assembly="A" path="a.dll" namespace="N"/>"#);
    let err = TransformationBuilder::new()
        .logger(logger.clone())
        .from_str(&transform)
        .err()
        .unwrap();
    match err.root() {
        Error::ImportDirectiveInvalid(message) => {
            assert_eq!(message, "Import cannot have both an 'assembly' and a 'path' attribute")
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(err.location().map(|l| l.line), Some(2));
    assert_eq!(logger.errors().len(), 1);
}

#[test]
fn test_import_without_namespace_fails_to_load() {
    let transform = xdt(r#"  <xdt:Import assembly="A"/>"#);
    let err = TransformationBuilder::new().from_str(&transform).err().unwrap();
    assert_eq!(
        err.root().to_string(),
        "Invalid Import directive: Import requires a 'namespace' attribute"
    );
}

#[test]
fn test_import_of_unknown_module_fails_to_load() {
    let transform = xdt(r#"  <xdt:Import assembly="Nowhere" namespace="N"/>"#);
    let err = TransformationBuilder::new().from_str(&transform).err().unwrap();
    assert_eq!(err.root().to_string(), "Could not load module 'Nowhere'");
}

#[test]
fn test_path_import_is_relative_to_transform_file() {
    let dir = tempfile::tempdir().unwrap();
    let transform_path = dir.path().join("web.Release.config");
    std::fs::write(
        &transform_path,
        xdt(r#"  <xdt:Import path="ext/acme.dll" namespace="Acme.Transforms"/>
  <appSettings>
    <add key="b" xdt:Transform="MarkDone" xdt:Locator="Match(key)"/>
  </appSettings>"#),
    )
    .unwrap();

    let loader = StaticModuleLoader::new().with_path(dir.path().join("ext/acme.dll"), acme_module());
    let logger = CollectingLogger::new();
    let mut transformation = TransformationBuilder::new()
        .logger(logger.clone())
        .module_loader(loader)
        .from_file(&transform_path)
        .unwrap();
    let document = Document::parse_str(WEB_CONFIG, &LoadOptions::preserving()).unwrap();
    let (mut document, succeeded) = transformation.apply_to_document(document);
    assert!(succeeded, "{}", logger.log_text());
    assert_eq!(
        document.to_xml_string(),
        WEB_CONFIG.replace(r#"<add key="b" value="2"/>"#, r#"<add key="b" value="2" done="true"/>"#)
    );
}

#[test]
fn test_diagnostics_name_the_transform_file() {
    let dir = tempfile::tempdir().unwrap();
    let transform_path = dir.path().join("web.Debug.config");
    std::fs::write(
        &transform_path,
        xdt(r#"  <appSettings>
    <add key="zzz" xdt:Transform="Remove" xdt:Locator="Match(key)"/>
  </appSettings>"#),
    )
    .unwrap();

    let logger = CollectingLogger::new();
    let mut transformation = TransformationBuilder::new()
        .logger(logger.clone())
        .from_file(&transform_path)
        .unwrap();
    let document = Document::parse_str(WEB_CONFIG, &LoadOptions::preserving()).unwrap();
    transformation.apply_to_document(document);
    let warnings = logger.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].to_line(),
        "web.Debug.config (3, 6) warning: No element in the source document matches '/configuration/appSettings/add[@key='zzz']'"
    );
}

// ====== Locators ======

fn transform_element(text: &str) -> Document {
    Document::parse_str(text, &LoadOptions::default()).unwrap()
}

#[test]
fn test_default_locator_names_the_element() {
    let doc = transform_element(r#"<add key="a"/>"#);
    let element = doc.document_element().unwrap();
    let binding = LocatorBinding::new("DefaultLocator", "/configuration/appSettings", &doc, element, None);
    assert_eq!(
        DefaultLocator.construct_path(&binding).unwrap(),
        "/configuration/appSettings/add"
    );
    assert_eq!(
        DefaultLocator.construct_parent_path(&binding).unwrap(),
        "/configuration/appSettings"
    );
}

#[test]
fn test_default_locator_uses_reserved_prefix_for_default_namespace() {
    let doc = transform_element(r#"<c xmlns="urn:x"><item/></c>"#);
    let root = doc.document_element().unwrap();
    let item = doc.element_children(root).next().unwrap();
    let binding = LocatorBinding::new("DefaultLocator", "/_defaultNamespace:c", &doc, item, None);
    assert_eq!(
        DefaultLocator.construct_path(&binding).unwrap(),
        "/_defaultNamespace:c/_defaultNamespace:item"
    );
}

#[test]
fn test_match_locator_joins_keys_and_quotes_values() {
    let doc = transform_element(r#"<add key="it's" name="n"/>"#);
    let element = doc.document_element().unwrap();
    let binding = LocatorBinding::new("Match", "/configuration", &doc, element, Some("key, name"));
    assert_eq!(
        MatchLocator.construct_path(&binding).unwrap(),
        r#"/configuration/add[@key="it's" and @name='n']"#
    );
}

#[test]
fn test_match_locator_requires_a_key() {
    let doc = transform_element(r#"<add key="a"/>"#);
    let element = doc.document_element().unwrap();
    let binding = LocatorBinding::new("Match", "/configuration", &doc, element, None);
    match MatchLocator.construct_path(&binding) {
        Err(Error::ArgumentCountOutOfRange { name, bound }) => {
            assert_eq!(name, "Match");
            assert_eq!(bound, ArgumentBound::AtLeast(1));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_condition_locator_uses_argument_as_predicate() {
    let doc = transform_element(r#"<add/>"#);
    let element = doc.document_element().unwrap();
    let binding = LocatorBinding::new("Condition", "/configuration", &doc, element, Some("@key='a' or @key='b'"));
    assert_eq!(
        ConditionLocator.construct_path(&binding).unwrap(),
        "/configuration/add[@key='a' or @key='b']"
    );

    let binding = LocatorBinding::new("Condition", "/configuration", &doc, element, Some("a, b"));
    assert_eq!(
        ConditionLocator.construct_path(&binding).unwrap_err().to_string(),
        "Condition requires exactly 1 argument"
    );
}

#[test]
fn test_xpath_locator_relative_and_absolute() {
    let doc = transform_element(r#"<add/>"#);
    let element = doc.document_element().unwrap();

    let relative = "../../connectionStrings/add[@name='db']";
    let binding = LocatorBinding::new("XPath", "/configuration/appSettings", &doc, element, Some(relative));
    let path = XPathLocator.construct_path(&binding).unwrap();
    assert_eq!(path, "/configuration/appSettings/add/../../connectionStrings/add[@name='db']");
    assert_eq!(XPathLocator.construct_parent_path(&binding).unwrap(), path);

    let binding = LocatorBinding::new("XPath", "/configuration/appSettings", &doc, element, Some("./value"));
    assert_eq!(
        XPathLocator.construct_path(&binding).unwrap(),
        "/configuration/appSettings/add/value"
    );

    let binding = LocatorBinding::new("XPath", "/configuration/appSettings", &doc, element, Some("//add"));
    assert_eq!(XPathLocator.construct_path(&binding).unwrap(), "//add");
}

// ====== Registry ======

#[test]
fn test_registry_resolves_builtin_names() {
    let registry = NamedTypeRegistry::default();
    assert!(registry.construct_transform("SetAttributes").is_ok());
    assert!(registry.construct_locator("XPath").is_ok());
    assert!(matches!(
        registry.construct_locator("Replace").err(),
        Some(Error::IncompatibleKind {
            expected: TypeKind::Locator,
            found: TypeKind::Transform,
            ..
        })
    ));
    assert!(matches!(
        registry.construct_locator("Locator").err(),
        Some(Error::NotConstructible { .. })
    ));
    assert!(matches!(
        registry.construct_transform("Nope").err(),
        Some(Error::UnknownName { kind: TypeKind::Transform, .. })
    ));
}

#[test]
fn test_registry_ignores_duplicate_registration() {
    let loader = StaticModuleLoader::new().with_module("Acme", acme_module());
    let mut registry = NamedTypeRegistry::new(Box::new(loader));
    registry.add_module_registration("Acme", "Acme.Transforms").unwrap();
    registry.add_module_registration("Acme", "Acme.Transforms").unwrap();
    assert!(registry.construct_transform("MarkDone").is_ok());
}

#[test]
fn test_module_registered_under_other_namespace_exposes_nothing() {
    let loader = StaticModuleLoader::new().with_module("Acme", acme_module());
    let mut registry = NamedTypeRegistry::new(Box::new(loader));
    registry.add_module_registration("Acme", "Elsewhere").unwrap();
    assert!(matches!(
        registry.construct_transform("MarkDone").err(),
        Some(Error::UnknownName { .. })
    ));
}
