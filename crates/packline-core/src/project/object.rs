//! Static evaluation of `packline.config.js`.
//!
//! The config module must export a plain object literal, either as
//! `export default { ... }` or `module.exports = { ... }`. Values may be
//! JSON5-like literals (unquoted keys, single quotes, trailing commas) and
//! regular expression literals, which become their pattern source.

use serde_json::Value;

/// Extract and parse the exported object literal.
pub fn parse_exported_object(source: &str) -> Result<Value, String> {
    let obj_str = extract_exported_object(source).ok_or_else(|| {
        "No `export default { ... }` or `module.exports = { ... }` found in config file"
            .to_string()
    })?;
    let mut parser = JsObjectParser::new(&obj_str);
    parser.parse_value()
}

/// Return the exported object literal including its outer braces.
fn extract_exported_object(source: &str) -> Option<String> {
    let stripped = strip_comments(source);

    let after = ["export default", "module.exports ="]
        .iter()
        .find_map(|marker| {
            stripped
                .find(marker)
                .map(|idx| stripped[idx + marker.len()..].trim_start())
        })?;

    if !after.starts_with('{') {
        return None;
    }

    let mut depth = 0;
    let mut in_string: Option<char> = None;
    let mut prev = '\0';
    let mut end = 0;

    for (i, ch) in after.char_indices() {
        if let Some(quote) = in_string {
            if ch == quote && prev != '\\' {
                in_string = None;
            }
        } else {
            match ch {
                '"' | '\'' | '`' => in_string = Some(ch),
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = i + 1;
                        break;
                    }
                }
                _ => {}
            }
        }
        prev = ch;
    }

    if depth != 0 {
        return None;
    }

    Some(after[..end].to_string())
}

/// Strip `//` and `/* */` comments, keeping string contents and line structure.
fn strip_comments(source: &str) -> String {
    let mut result = String::with_capacity(source.len());
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut i = 0;
    let mut in_string: Option<char> = None;

    while i < len {
        if let Some(quote) = in_string {
            result.push(chars[i]);
            if chars[i] == quote && (i == 0 || chars[i - 1] != '\\') {
                in_string = None;
            }
            i += 1;
        } else if chars[i] == '\\' && i + 1 < len {
            // Escapes inside regex literals, e.g. `\//`
            result.push(chars[i]);
            result.push(chars[i + 1]);
            i += 2;
        } else if i + 1 < len && chars[i] == '/' && chars[i + 1] == '/' {
            while i < len && chars[i] != '\n' {
                i += 1;
            }
        } else if i + 1 < len && chars[i] == '/' && chars[i + 1] == '*' {
            i += 2;
            while i + 1 < len && !(chars[i] == '*' && chars[i + 1] == '/') {
                if chars[i] == '\n' {
                    result.push('\n');
                }
                i += 1;
            }
            i += 2;
        } else {
            if chars[i] == '"' || chars[i] == '\'' || chars[i] == '`' {
                in_string = Some(chars[i]);
            }
            result.push(chars[i]);
            i += 1;
        }
    }

    result
}

struct JsObjectParser {
    chars: Vec<char>,
    pos: usize,
}

impl JsObjectParser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn parse_value(&mut self) -> Result<Value, String> {
        self.skip_whitespace();
        match self.peek() {
            Some('{') => self.parse_object(),
            Some('[') => self.parse_array(),
            Some('"' | '\'') => self.parse_string(),
            Some('/') => self.parse_regex(),
            Some(ch) if ch == '-' || ch.is_ascii_digit() => self.parse_number(),
            Some('t' | 'f') => self.parse_bool(),
            Some('n') => self.parse_null(),
            Some(ch) => Err(format!(
                "Unsupported expression starting with '{ch}' at position {} (only literal values are allowed)",
                self.pos
            )),
            None => Err("Unexpected end of input".to_string()),
        }
    }

    fn parse_object(&mut self) -> Result<Value, String> {
        self.advance();
        let mut map = serde_json::Map::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('}') => {
                    self.advance();
                    return Ok(Value::Object(map));
                }
                None => return Err("Unterminated object".to_string()),
                _ => {}
            }

            let key = self.parse_key()?;
            self.skip_whitespace();

            match self.advance() {
                Some(':') => {}
                other => return Err(format!("Expected ':' after key '{key}', got {other:?}")),
            }

            let value = self.parse_value()?;
            map.insert(key, value);

            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.advance();
                }
                Some('}') => {}
                None => return Err("Unterminated object".to_string()),
                Some(ch) => return Err(format!("Expected ',' or '}}' in object, got '{ch}'")),
            }
        }
    }

    fn parse_array(&mut self) -> Result<Value, String> {
        self.advance();
        let mut arr = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(']') => {
                    self.advance();
                    return Ok(Value::Array(arr));
                }
                None => return Err("Unterminated array".to_string()),
                _ => {}
            }

            arr.push(self.parse_value()?);

            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.advance();
                }
                Some(']') => {}
                None => return Err("Unterminated array".to_string()),
                Some(ch) => return Err(format!("Expected ',' or ']' in array, got '{ch}'")),
            }
        }
    }

    fn parse_key(&mut self) -> Result<String, String> {
        self.skip_whitespace();
        match self.peek() {
            Some('"' | '\'') => match self.parse_string()? {
                Value::String(s) => Ok(s),
                _ => Err("Expected string key".to_string()),
            },
            Some(ch) if ch.is_alphabetic() || ch == '_' || ch == '$' => {
                let mut key = String::new();
                while let Some(ch) = self.peek() {
                    if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                        key.push(ch);
                        self.advance();
                    } else {
                        break;
                    }
                }
                Ok(key)
            }
            other => Err(format!("Expected object key, got {other:?}")),
        }
    }

    fn parse_string(&mut self) -> Result<Value, String> {
        let quote = self.advance().ok_or("Unexpected end of input")?;
        let mut s = String::new();

        loop {
            match self.advance() {
                Some(ch) if ch == quote => return Ok(Value::String(s)),
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some('\\') => s.push('\\'),
                    Some(ch) if ch == quote => s.push(ch),
                    Some(ch) => {
                        s.push('\\');
                        s.push(ch);
                    }
                    None => return Err("Unterminated string escape".to_string()),
                },
                Some(ch) => s.push(ch),
                None => return Err("Unterminated string".to_string()),
            }
        }
    }

    /// `/pattern/flags` becomes the pattern string. `i` maps to `(?i)`.
    fn parse_regex(&mut self) -> Result<Value, String> {
        self.advance();
        let mut pattern = String::new();
        let mut in_class = false;

        loop {
            match self.advance() {
                Some('\\') => match self.advance() {
                    // `\/` only exists to escape the delimiter
                    Some('/') => pattern.push('/'),
                    Some(ch) => {
                        pattern.push('\\');
                        pattern.push(ch);
                    }
                    None => return Err("Unterminated regular expression".to_string()),
                },
                Some('[') => {
                    in_class = true;
                    pattern.push('[');
                }
                Some(']') => {
                    in_class = false;
                    pattern.push(']');
                }
                Some('/') if !in_class => break,
                Some('\n') | None => return Err("Unterminated regular expression".to_string()),
                Some(ch) => pattern.push(ch),
            }
        }

        let mut flags = String::new();
        while let Some(ch) = self.peek().filter(char::is_ascii_alphabetic) {
            flags.push(ch);
            self.advance();
        }
        if flags.contains('i') {
            pattern.insert_str(0, "(?i)");
        }
        Ok(Value::String(pattern))
    }

    fn parse_number(&mut self) -> Result<Value, String> {
        let mut num_str = String::new();
        let mut has_dot = false;

        if self.peek() == Some('-') {
            num_str.push('-');
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                num_str.push(ch);
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                num_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if has_dot {
            num_str
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("Invalid number '{num_str}'"))
        } else {
            num_str
                .parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .map_err(|e| format!("Invalid number '{num_str}': {e}"))
        }
    }

    fn parse_bool(&mut self) -> Result<Value, String> {
        if self.starts_with("true") {
            self.pos += 4;
            Ok(Value::Bool(true))
        } else if self.starts_with("false") {
            self.pos += 5;
            Ok(Value::Bool(false))
        } else {
            Err(format!("Unexpected token at position {}", self.pos))
        }
    }

    fn parse_null(&mut self) -> Result<Value, String> {
        if self.starts_with("null") {
            self.pos += 4;
            Ok(Value::Null)
        } else {
            Err(format!("Unexpected token at position {}", self.pos))
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        let expected: Vec<char> = s.chars().collect();
        self.chars[self.pos..].starts_with(&expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_export_default_object() {
        let source = r"
export default {
  entry: './src/index.tsx',
  devServer: { host: '127.0.0.1', port: 26386 },
};
";
        let value = parse_exported_object(source).unwrap();
        assert_eq!(value["entry"], "./src/index.tsx");
        assert_eq!(value["devServer"]["port"], 26386);
    }

    #[test]
    fn test_module_exports_object() {
        let value = parse_exported_object("module.exports = { output: { clean: false } };").unwrap();
        assert_eq!(value, json!({ "output": { "clean": false } }));
    }

    #[test]
    fn test_comments_and_trailing_commas() {
        let source = r#"
// build config
export default {
  /* entry point */
  entry: "./src/main.ts", // trailing
  resolve: { extensions: ['...', '.ts',], },
};
"#;
        let value = parse_exported_object(source).unwrap();
        assert_eq!(value["resolve"]["extensions"], json!(["...", ".ts"]));
    }

    #[test]
    fn test_regex_literals_become_patterns() {
        let source = r"export default {
  module: { rules: [{ test: /\.(ts|tsx)$/, type: 'javascript/auto' }] },
  vendors: /[\\/]node_modules[\\/]/,
  upper: /\.PNG$/i,
  escaped: /node_modules\/@pdd\/monitor\//,
};";
        let value = parse_exported_object(source).unwrap();
        assert_eq!(value["module"]["rules"][0]["test"], r"\.(ts|tsx)$");
        assert_eq!(value["vendors"], r"[\\/]node_modules[\\/]");
        assert_eq!(value["upper"], r"(?i)\.PNG$");
        assert_eq!(value["escaped"], "node_modules/@pdd/monitor/");
    }

    #[test]
    fn test_negative_and_float_numbers() {
        let value = parse_exported_object("export default { priority: -10, ratio: 0.5 }").unwrap();
        assert_eq!(value["priority"], -10);
        assert_eq!(value["ratio"], 0.5);
    }

    #[test]
    fn test_expressions_rejected() {
        let err = parse_exported_object("export default { mode: process.env.NODE_ENV }").unwrap_err();
        assert!(err.contains("only literal values"));
    }

    #[test]
    fn test_no_export() {
        assert!(parse_exported_object("const config = {};").is_err());
    }
}
