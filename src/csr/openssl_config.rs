// csr/openssl_config.rs
use super::types::CsrRequestDescriptor;

/// Renders an `openssl req -config` file for the descriptor. `prompt = no`
/// makes OpenSSL take the subject values verbatim, in section order.
pub fn render_request_config(descriptor: &CsrRequestDescriptor) -> String {
    let mut content = format!(
        r#"[req]
default_bits = {}
default_md = sha256
distinguished_name = req_distinguished_name
req_extensions = v3_req
prompt = no
utf8 = yes
string_mask = utf8only

[req_distinguished_name]
"#,
        descriptor.key_bits
    );

    for (attr, value) in descriptor.subject.attributes() {
        content.push_str(&format!("{} = {}\n", attr.short_name(), escape_value(value)));
    }

    content.push_str("\n[v3_req]\nsubjectAltName = @alt_names\n\n[alt_names]\n");
    for (i, name) in descriptor.sans.iter().enumerate() {
        content.push_str(&format!("DNS.{} = {}\n", i + 1, escape_value(name.as_str())));
    }

    content
}

/// Config files are line based and have no escape for line breaks, so a
/// value with a control character would split into extra directives.
pub fn check_config_values(descriptor: &CsrRequestDescriptor) -> Result<(), String> {
    let subject = descriptor
        .subject
        .attributes()
        .into_iter()
        .map(|(attr, value)| (attr.short_name(), value));
    let sans = descriptor.sans.iter().map(|name| ("DNS", name.as_str()));

    for (field, value) in subject.chain(sans) {
        if value.chars().any(char::is_control) {
            return Err(format!(
                "{} value {:?} contains a control character and cannot be written to an OpenSSL config",
                field, value
            ));
        }
    }
    Ok(())
}

/// OpenSSL config values treat `#` as a comment, `$` as a variable reference
/// and quotes/backslashes as escapes.
fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '$' | '#' | '"' | '\'') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
