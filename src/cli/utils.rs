use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&success_body(message, data))?),
        OutputFormat::Text => println!("✓ {}", message),
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });
            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => eprintln!("Error: {}", message),
    }
    Ok(())
}

fn success_body(message: &str, data: Option<Value>) -> Value {
    let mut response = json!({
        "success": true,
        "message": message
    });

    match data {
        Some(Value::Object(fields)) => {
            if let Some(body) = response.as_object_mut() {
                body.extend(fields);
            }
        }
        Some(Value::Null) | None => {}
        Some(other) => response["data"] = other,
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_data_is_flattened() {
        let body = success_body("ok", Some(json!({"token": "abc"})));
        assert_eq!(body, json!({"success": true, "message": "ok", "token": "abc"}));
    }

    #[test]
    fn other_data_is_nested() {
        assert_eq!(success_body("ok", Some(json!([1]))), json!({"success": true, "message": "ok", "data": [1]}));
        assert_eq!(success_body("ok", None), json!({"success": true, "message": "ok"}));
    }
}
