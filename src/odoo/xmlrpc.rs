//! XML-RPC wire codec
//!
//! Encodes `methodCall` documents and decodes `methodResponse` documents.
//! Values are carried as `serde_json::Value` so records stay open maps.

use crate::types::OdooError;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::{Map, Number, Value};
use tracing::debug;
use url::Url;

/// Build a `methodCall` document for `method` with positional `params`
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodCall>");
    out.push_str("<methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        encode_value(param, &mut out);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>\n");
    out
}

fn encode_value(value: &Value, out: &mut String) {
    out.push_str("<value>");
    match value {
        Value::Null => out.push_str("<nil/>"),
        Value::Bool(b) => {
            out.push_str(if *b { "<boolean>1</boolean>" } else { "<boolean>0</boolean>" })
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i32::try_from(i).is_ok() {
                    out.push_str(&format!("<int>{}</int>", i));
                } else {
                    out.push_str(&format!("<i8>{}</i8>", i));
                }
            } else {
                out.push_str(&format!("<double>{}</double>", n.as_f64().unwrap_or_default()));
            }
        }
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</string>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                encode_value(item, out);
            }
            out.push_str("</data></array>");
        }
        Value::Object(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                encode_value(member, out);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

/// Decode a `methodResponse` document.
///
/// A `<fault>` response becomes [`OdooError::Fault`].
pub fn decode_response(body: &str) -> Result<Value, OdooError> {
    let mut parser = Parser::new(tokenize(body)?);

    parser.expect_start("methodResponse")?;
    parser.skip_whitespace();

    let section = match parser.peek() {
        Some(Token::Start(name)) if name == "params" || name == "fault" => name.clone(),
        other => {
            return Err(invalid(format!(
                "expected <params> or <fault>, found {:?}",
                other
            )))
        }
    };

    let result = if section == "params" {
        parser.expect_start("params")?;
        parser.expect_start("param")?;
        let value = parser.parse_value()?;
        parser.expect_end("param")?;
        parser.expect_end("params")?;
        Ok(value)
    } else {
        parser.expect_start("fault")?;
        let value = parser.parse_value()?;
        parser.expect_end("fault")?;
        Err(fault_from_value(value))
    };

    parser.expect_end("methodResponse")?;
    result
}

fn fault_from_value(value: Value) -> OdooError {
    let code = match value.get("faultCode") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    };
    let message = value
        .get("faultString")
        .and_then(Value::as_str)
        .unwrap_or("unknown fault")
        .to_string();

    OdooError::Fault { code, message }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Start(String),
    End(String),
    Text(String),
}

fn invalid(e: impl std::fmt::Display) -> OdooError {
    OdooError::InvalidResponse(e.to_string())
}

fn tokenize(body: &str) -> Result<Vec<Token>, OdooError> {
    let mut reader = Reader::from_str(body);
    let mut tokens = Vec::new();

    loop {
        match reader.read_event().map_err(invalid)? {
            Event::Start(e) => {
                tokens.push(Token::Start(String::from_utf8_lossy(e.name().as_ref()).into_owned()))
            }
            Event::End(e) => {
                tokens.push(Token::End(String::from_utf8_lossy(e.name().as_ref()).into_owned()))
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                tokens.push(Token::Start(name.clone()));
                tokens.push(Token::End(name));
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(invalid)?.into_owned();
                tokens.push(Token::Text(text));
            }
            Event::CData(e) => {
                tokens.push(Token::Text(String::from_utf8_lossy(&e.into_inner()).into_owned()))
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn skip_whitespace(&mut self) {
        while let Some(Token::Text(text)) = self.peek() {
            if !text.trim().is_empty() {
                break;
            }
            self.pos += 1;
        }
    }

    fn peek_end(&mut self, name: &str) -> bool {
        self.skip_whitespace();
        matches!(self.peek(), Some(Token::End(n)) if n == name)
    }

    fn expect_start(&mut self, name: &str) -> Result<(), OdooError> {
        self.skip_whitespace();
        match self.next() {
            Some(Token::Start(n)) if n == name => Ok(()),
            other => Err(invalid(format!("expected <{}>, found {:?}", name, other))),
        }
    }

    fn expect_end(&mut self, name: &str) -> Result<(), OdooError> {
        self.skip_whitespace();
        match self.next() {
            Some(Token::End(n)) if n == name => Ok(()),
            other => Err(invalid(format!("expected </{}>, found {:?}", name, other))),
        }
    }

    /// Concatenate text up to the closing tag of `name`
    fn text_until_end(&mut self, name: &str) -> Result<String, OdooError> {
        let mut text = String::new();
        loop {
            match self.next() {
                Some(Token::Text(t)) => text.push_str(&t),
                Some(Token::End(n)) if n == name => return Ok(text),
                other => {
                    return Err(invalid(format!(
                        "unexpected {:?} inside <{}>",
                        other, name
                    )))
                }
            }
        }
    }

    fn parse_value(&mut self) -> Result<Value, OdooError> {
        self.expect_start("value")?;

        // An untyped value is a string
        let mut untyped = String::new();
        while let Some(Token::Text(t)) = self.peek() {
            untyped.push_str(t);
            self.pos += 1;
        }
        if let Some(Token::End(n)) = self.peek() {
            if n == "value" {
                self.pos += 1;
                return Ok(Value::String(untyped));
            }
        }

        let tag = match self.next() {
            Some(Token::Start(tag)) => tag,
            other => return Err(invalid(format!("expected value type, found {:?}", other))),
        };

        let value = match tag.as_str() {
            "string" | "dateTime.iso8601" | "base64" => Value::String(self.text_until_end(&tag)?),
            "int" | "i4" | "i8" => {
                let text = self.text_until_end(&tag)?;
                let n: i64 = text
                    .trim()
                    .parse()
                    .map_err(|e| invalid(format!("bad <{}> '{}': {}", tag, text, e)))?;
                Value::Number(n.into())
            }
            "double" => {
                let text = self.text_until_end(&tag)?;
                let f: f64 = text
                    .trim()
                    .parse()
                    .map_err(|e| invalid(format!("bad <double> '{}': {}", text, e)))?;
                Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| invalid(format!("non-finite <double> '{}'", text)))?
            }
            "boolean" => match self.text_until_end(&tag)?.trim() {
                "1" => Value::Bool(true),
                "0" => Value::Bool(false),
                other => return Err(invalid(format!("bad <boolean> '{}'", other))),
            },
            "nil" => {
                self.expect_end("nil")?;
                Value::Null
            }
            "array" => {
                self.expect_start("data")?;
                let mut items = Vec::new();
                while !self.peek_end("data") {
                    items.push(self.parse_value()?);
                }
                self.expect_end("data")?;
                self.expect_end("array")?;
                Value::Array(items)
            }
            "struct" => {
                let mut members = Map::new();
                while !self.peek_end("struct") {
                    self.expect_start("member")?;
                    self.expect_start("name")?;
                    let name = self.text_until_end("name")?;
                    let member = self.parse_value()?;
                    self.expect_end("member")?;
                    members.insert(name, member);
                }
                self.expect_end("struct")?;
                Value::Object(members)
            }
            other => return Err(invalid(format!("unsupported value type <{}>", other))),
        };

        self.expect_end("value")?;
        Ok(value)
    }
}

/// One XML-RPC endpoint (e.g. `/xmlrpc/2/common`)
#[derive(Debug, Clone)]
pub struct XmlRpcClient {
    http: Client,
    endpoint: Url,
}

impl XmlRpcClient {
    pub fn new(http: Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// POST a method call and decode the response
    pub async fn call(&self, method: &str, params: &[Value]) -> Result<Value, OdooError> {
        let body = encode_call(method, params);
        debug!("XML-RPC call {} -> {}", method, self.endpoint);

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await?
            .error_for_status()?;

        let text = response.text().await?;
        decode_response(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_call_authenticate() {
        let xml = encode_call("authenticate", &[json!("db"), json!("admin"), json!("a<b"), json!({})]);
        assert!(xml.contains("<methodName>authenticate</methodName>"));
        assert!(xml.contains("<param><value><string>db</string></value></param>"));
        assert!(xml.contains("<string>a&lt;b</string>"));
        assert!(xml.contains("<value><struct></struct></value>"));
    }

    #[test]
    fn test_encode_domain_and_kwargs() {
        let xml = encode_call(
            "execute_kw",
            &[json!([["customer_rank", ">", 0]]), json!({"limit": 5, "active": true})],
        );
        assert!(xml.contains(
            "<array><data><value><array><data><value><string>customer_rank</string></value>\
             <value><string>&gt;</string></value><value><int>0</int></value></data></array></value></data></array>"
        ));
        assert!(xml.contains("<member><name>limit</name><value><int>5</int></value></member>"));
        assert!(xml.contains("<boolean>1</boolean>"));
    }

    #[test]
    fn test_decode_int_response() {
        let body = r#"<?xml version='1.0'?>
<methodResponse>
<params>
<param>
<value><int>2</int></value>
</param>
</params>
</methodResponse>
"#;
        assert_eq!(decode_response(body).unwrap(), json!(2));
    }

    #[test]
    fn test_decode_false_response() {
        let body = "<methodResponse><params><param><value><boolean>0</boolean></value></param></params></methodResponse>";
        assert_eq!(decode_response(body).unwrap(), json!(false));
    }

    #[test]
    fn test_decode_records() {
        let body = r#"<?xml version='1.0'?>
<methodResponse>
<params>
<param>
<value><array><data>
<value><struct>
<member>
<name>id</name>
<value><int>7</int></value>
</member>
<member>
<name>name</name>
<value><string>Azure &amp; Co</string></value>
</member>
<member>
<name>phone</name>
<value><boolean>0</boolean></value>
</member>
<member>
<name>list_price</name>
<value><double>12.5</double></value>
</member>
<member>
<name>categ_id</name>
<value><array><data>
<value><int>1</int></value>
<value><string>All</string></value>
</data></array></value>
</member>
<member>
<name>note</name>
<value>untyped</value>
</member>
<member>
<name>empty</name>
<value><string></string></value>
</member>
<member>
<name>missing</name>
<value><nil/></value>
</member>
</struct></value>
</data></array></value>
</param>
</params>
</methodResponse>
"#;
        let value = decode_response(body).unwrap();
        assert_eq!(
            value,
            json!([{
                "id": 7,
                "name": "Azure & Co",
                "phone": false,
                "list_price": 12.5,
                "categ_id": [1, "All"],
                "note": "untyped",
                "empty": "",
                "missing": null
            }])
        );
    }

    #[test]
    fn test_decode_fault() {
        let body = r#"<?xml version='1.0'?>
<methodResponse>
<fault>
<value><struct>
<member>
<name>faultCode</name>
<value><int>1</int></value>
</member>
<member>
<name>faultString</name>
<value><string>Object res.partnr doesn't exist</string></value>
</member>
</struct></value>
</fault>
</methodResponse>
"#;
        match decode_response(body) {
            Err(OdooError::Fault { code, message }) => {
                assert_eq!(code, 1);
                assert_eq!(message, "Object res.partnr doesn't exist");
            }
            other => panic!("expected fault, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_response("<html><body>502 Bad Gateway</body></html>"),
            Err(OdooError::InvalidResponse(_))
        ));
        assert!(matches!(
            decode_response("<methodResponse><params><param><value><int>x</int></value></param></params></methodResponse>"),
            Err(OdooError::InvalidResponse(_))
        ));
    }
}
