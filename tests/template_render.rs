use std::collections::BTreeMap;
use std::error::Error;

use jobx::errors::ConfigError;
use jobx::exec::render;

type TestResult = Result<(), Box<dyn Error>>;

fn values(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn substitutes_placeholders_from_values() -> TestResult {
    let values = values(&[("module", "thx")]);
    assert_eq!(render("flake8 {module}", &values)?, "flake8 thx");
    Ok(())
}

#[test]
fn substitutes_multiple_placeholders() -> TestResult {
    let values = values(&[("module", "jobx"), ("python_version", "3.11.4")]);
    assert_eq!(
        render("python{python_version} -m {module}.tests {module}", &values)?,
        "python3.11.4 -m jobx.tests jobx"
    );
    Ok(())
}

#[test]
fn missing_value_names_the_placeholder() {
    let err = render("flake8 {module}", &values(&[])).unwrap_err();
    match err {
        ConfigError::MissingValue {
            template,
            placeholder,
        } => {
            assert_eq!(template, "flake8 {module}");
            assert_eq!(placeholder, "module");
        }
        other => panic!("expected MissingValue, got {other:?}"),
    }
}

#[test]
fn doubled_braces_render_literally() -> TestResult {
    let values = values(&[("name", "world")]);
    assert_eq!(render("echo {{{name}}}", &values)?, "echo {world}");
    assert_eq!(render("echo {{literal}}", &values)?, "echo {literal}");
    Ok(())
}

#[test]
fn unterminated_placeholder_is_invalid() {
    let err = render("echo {oops", &values(&[])).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}
