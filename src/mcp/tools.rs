//! MCP tools implementation
//!
//! Defines the four read-only Odoo tools, dispatches calls to a
//! [`RecordSource`] and renders the records as text.

use crate::mcp::protocol::{CallToolResult, Tool};
use crate::odoo::{Domain, Operator, Record, RecordSource};
use crate::types::OdooError;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Text returned whenever there is no authenticated session
pub const NO_CONNECTION: &str = "No connection to Odoo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdooTool {
    Customers,
    Products,
    SaleOrders,
    Users,
}

impl OdooTool {
    pub const ALL: [OdooTool; 4] = [
        OdooTool::Customers,
        OdooTool::Products,
        OdooTool::SaleOrders,
        OdooTool::Users,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            OdooTool::Customers => "get_customers",
            OdooTool::Products => "get_products",
            OdooTool::SaleOrders => "get_sale_orders",
            OdooTool::Users => "get_users",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            OdooTool::Customers => "Get the list of customers from Odoo",
            OdooTool::Products => "Get the list of saleable products from Odoo",
            OdooTool::SaleOrders => "Get sale orders from Odoo",
            OdooTool::Users => "Get the list of users from Odoo",
        }
    }

    fn limit_description(&self) -> &'static str {
        match self {
            OdooTool::Customers => "Maximum number of customers to fetch",
            OdooTool::Products => "Maximum number of products to fetch",
            OdooTool::SaleOrders => "Maximum number of orders to fetch",
            OdooTool::Users => "Maximum number of users to fetch",
        }
    }

    /// Odoo model the tool reads from
    pub fn model(&self) -> &'static str {
        match self {
            OdooTool::Customers => "res.partner",
            OdooTool::Products => "product.product",
            OdooTool::SaleOrders => "sale.order",
            OdooTool::Users => "res.users",
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            OdooTool::Customers => Domain::all().with("customer_rank", Operator::Gt, 0),
            OdooTool::Products => Domain::all().with("sale_ok", Operator::Eq, true),
            OdooTool::SaleOrders | OdooTool::Users => Domain::all(),
        }
    }

    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            OdooTool::Customers => &["name", "email", "phone", "city"],
            OdooTool::Products => &["name", "list_price", "categ_id"],
            OdooTool::SaleOrders => &["name", "partner_id", "date_order", "amount_total", "state"],
            OdooTool::Users => &["name", "login", "email", "active"],
        }
    }

    pub fn default_limit(&self) -> u32 {
        match self {
            OdooTool::SaleOrders => 20,
            _ => 50,
        }
    }

    /// Message shown instead of a header when nothing matched
    pub fn empty_message(&self) -> &'static str {
        match self {
            OdooTool::Customers => {
                "**No customers registered**\n\nYou can add customers from Sales → Customers in Odoo."
            }
            OdooTool::Products => {
                "**No products registered**\n\nYou can add products from Sales → Products in Odoo."
            }
            OdooTool::SaleOrders => {
                "**No sale orders**\n\nOrders will appear once they are created from Sales → Orders."
            }
            OdooTool::Users => "**No users registered**",
        }
    }

    pub fn definition(&self) -> Tool {
        Tool {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "number",
                        "description": self.limit_description(),
                        "default": self.default_limit()
                    }
                }
            }),
        }
    }

    pub fn render(&self, records: &[Record]) -> String {
        if records.is_empty() {
            return self.empty_message().to_string();
        }

        match self {
            OdooTool::Customers => format_customers(records),
            OdooTool::Products => format_products(records),
            OdooTool::SaleOrders => format_sale_orders(records),
            OdooTool::Users => format_users(records),
        }
    }
}

/// Get all tool definitions
pub fn get_tool_definitions() -> Vec<Tool> {
    OdooTool::ALL.iter().map(OdooTool::definition).collect()
}

/// Call a tool by name.
///
/// Never fails: every error is rendered into the returned text.
pub async fn call_tool(
    name: &str,
    arguments: Option<Value>,
    source: Option<Arc<dyn RecordSource>>,
) -> CallToolResult {
    let source = match source {
        Some(source) => source,
        None => return CallToolResult::text(NO_CONNECTION),
    };

    let tool = match OdooTool::from_name(name) {
        Some(tool) => tool,
        None => {
            warn!("Unknown tool requested: {}", name);
            return CallToolResult::text(format!("Tool '{}' not found", name));
        }
    };

    let args = arguments.unwrap_or(Value::Null);
    let limit = requested_limit(&args).unwrap_or_else(|| tool.default_limit());
    debug!("Calling {} on {} with limit {}", tool.name(), tool.model(), limit);

    match source
        .search_read(tool.model(), &tool.domain(), tool.fields(), Some(limit))
        .await
    {
        Ok(records) => CallToolResult::text(tool.render(&records)),
        Err(e) if e.is_not_connected() => CallToolResult::text(NO_CONNECTION),
        Err(e) => {
            error!("{} error: {}", tool.name(), e);
            CallToolResult::text(format!("Error: {}", e))
        }
    }
}

/// `limit` argument when present and truthy.
///
/// Numbers and numeric strings are accepted and truncated to a whole
/// number. Anything below 1, non-finite or non-numeric yields `None` so
/// the tool default applies; values above `u32::MAX` saturate.
fn requested_limit(args: &Value) -> Option<u32> {
    let limit = match args.get("limit")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if limit.is_finite() && limit >= 1.0 {
        Some(limit.min(u32::MAX as f64) as u32)
    } else {
        None
    }
}

// Formatting helpers

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Field value when present and truthy
fn present<'a>(record: &'a Record, name: &str) -> Option<&'a Value> {
    record.get(name).filter(|v| is_truthy(v))
}

fn display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => "-".to_string(),
        Some(Value::Bool(true)) => "true".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| display(Some(item)))
            .collect::<Vec<_>>()
            .join(","),
        Some(other) => other.to_string(),
    }
}

/// Label of a `[id, label]` relational value
fn relation_label(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::Array(pair)) if pair.len() > 1 => Some(display(pair.get(1))),
        _ => None,
    }
}

fn format_customers(records: &[Record]) -> String {
    let mut output = format!("**{} customers found:**\n\n", records.len());

    for customer in records {
        output.push_str(&format!("**{}**\n", display(customer.get("name"))));
        if let Some(email) = present(customer, "email") {
            output.push_str(&format!("   Email: {}\n", display(Some(email))));
        }
        if let Some(phone) = present(customer, "phone") {
            output.push_str(&format!("   Phone: {}\n", display(Some(phone))));
        }
        if let Some(city) = present(customer, "city") {
            output.push_str(&format!("   City: {}\n", display(Some(city))));
        }
        output.push('\n');
    }

    output
}

fn format_products(records: &[Record]) -> String {
    let mut output = format!("**{} products found:**\n\n", records.len());

    for product in records {
        output.push_str(&format!("**{}**\n", display(product.get("name"))));
        output.push_str(&format!("   Price: ${}\n", display(product.get("list_price"))));
        if let Some(category) = relation_label(product.get("categ_id")) {
            output.push_str(&format!("   Category: {}\n", category));
        }
        output.push('\n');
    }

    output
}

fn format_sale_orders(records: &[Record]) -> String {
    let mut output = format!("**{} sale orders found:**\n\n", records.len());

    for order in records {
        output.push_str(&format!("**{}**\n", display(order.get("name"))));
        if let Some(partner) = relation_label(order.get("partner_id")) {
            output.push_str(&format!("   Customer: {}\n", partner));
        }
        output.push_str(&format!("   Date: {}\n", display(order.get("date_order"))));
        output.push_str(&format!("   Total: ${}\n", display(order.get("amount_total"))));
        output.push_str(&format!("   State: {}\n\n", display(order.get("state"))));
    }

    output
}

fn user_status(user: &Record) -> String {
    let inactive = user.get("active").is_some_and(|active| !is_truthy(active));

    if inactive {
        "inactive".to_string()
    } else if let Some(seen) = present(user, "last_activity_time") {
        format!("last seen: {}", display(Some(seen)))
    } else {
        "never logged in".to_string()
    }
}

fn format_users(records: &[Record]) -> String {
    let mut output = format!("**{} users found:**\n\n", records.len());

    for user in records {
        output.push_str(&format!("**{}**\n", display(user.get("name"))));
        output.push_str(&format!("   Login: {}\n", display(user.get("login"))));
        if let Some(email) = present(user, "email") {
            if user.get("login") != Some(email) {
                output.push_str(&format!("   Email: {}\n", display(Some(email))));
            }
        }
        output.push_str(&format!("   Status: {}\n\n", user_status(user)));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct RecordedCall {
        model: String,
        domain: Domain,
        fields: Vec<String>,
        limit: Option<u32>,
    }

    /// Canned record source that remembers every query
    struct FakeSource {
        records: Vec<Record>,
        fail_with: Option<fn() -> OdooError>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl FakeSource {
        fn returning(records: Vec<Value>) -> Arc<Self> {
            Arc::new(Self {
                records: records
                    .into_iter()
                    .map(|v| v.as_object().cloned().unwrap())
                    .collect(),
                fail_with: None,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing(fail_with: fn() -> OdooError) -> Arc<Self> {
            Arc::new(Self {
                records: Vec::new(),
                fail_with: Some(fail_with),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RecordSource for FakeSource {
        async fn search_read(
            &self,
            model: &str,
            domain: &Domain,
            fields: &[&str],
            limit: Option<u32>,
        ) -> Result<Vec<Record>, OdooError> {
            self.calls.lock().unwrap().push(RecordedCall {
                model: model.to_string(),
                domain: domain.clone(),
                fields: fields.iter().map(|f| f.to_string()).collect(),
                limit,
            });
            match self.fail_with {
                Some(make_error) => Err(make_error()),
                None => Ok(self.records.clone()),
            }
        }
    }

    async fn call(name: &str, args: Option<Value>, source: &Arc<FakeSource>) -> String {
        let source: Arc<dyn RecordSource> = source.clone();
        call_tool(name, args, Some(source))
            .await
            .first_text()
            .to_string()
    }

    #[test]
    fn test_tool_definitions() {
        let tools = get_tool_definitions();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["get_customers", "get_products", "get_sale_orders", "get_users"]
        );

        let defaults: Vec<u64> = tools
            .iter()
            .map(|t| t.input_schema["properties"]["limit"]["default"].as_u64().unwrap())
            .collect();
        assert_eq!(defaults, vec![50, 50, 20, 50]);

        for tool in &tools {
            assert_eq!(tool.input_schema["properties"]["limit"]["type"], "number");
            assert!(tool.input_schema.get("required").is_none());
        }
    }

    #[test]
    fn test_query_specs() {
        assert_eq!(OdooTool::Customers.model(), "res.partner");
        assert_eq!(
            OdooTool::Customers.domain().to_value(),
            json!([["customer_rank", ">", 0]])
        );
        assert_eq!(OdooTool::Products.model(), "product.product");
        assert_eq!(
            OdooTool::Products.domain().to_value(),
            json!([["sale_ok", "=", true]])
        );
        assert!(OdooTool::SaleOrders.domain().is_empty());
        assert!(OdooTool::Users.domain().is_empty());
        assert_eq!(OdooTool::Users.fields(), &["name", "login", "email", "active"]);
    }

    #[tokio::test]
    async fn test_no_source_yields_no_connection() {
        for tool in OdooTool::ALL {
            let result = call_tool(tool.name(), None, None).await;
            assert_eq!(result.first_text(), NO_CONNECTION);
            assert!(result.is_error.is_none());
        }
    }

    #[tokio::test]
    async fn test_not_connected_source_yields_no_connection() {
        let source = FakeSource::failing(|| OdooError::NotConnected);
        for tool in OdooTool::ALL {
            assert_eq!(call(tool.name(), None, &source).await, NO_CONNECTION);
        }
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let source = FakeSource::returning(vec![]);
        let text = call("get_invoices", None, &source).await;
        assert_eq!(text, "Tool 'get_invoices' not found");
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_read_error_is_rendered() {
        let source = FakeSource::failing(|| OdooError::Fault {
            code: 1,
            message: "Access Denied".to_string(),
        });
        let text = call("get_users", None, &source).await;
        assert!(text.starts_with("Error: "));
        assert!(text.contains("Access Denied"));
    }

    #[tokio::test]
    async fn test_limit_override_and_default() {
        let source = FakeSource::returning(vec![]);

        call("get_customers", Some(json!({"limit": 5})), &source).await;
        call("get_customers", None, &source).await;
        call("get_sale_orders", Some(json!({})), &source).await;
        call("get_products", Some(json!({"limit": 0})), &source).await;

        let limits: Vec<Option<u32>> = source.calls().iter().map(|c| c.limit).collect();
        assert_eq!(limits, vec![Some(5), Some(50), Some(20), Some(50)]);

        let first = &source.calls()[0];
        assert_eq!(first.model, "res.partner");
        assert_eq!(first.fields, vec!["name", "email", "phone", "city"]);
        assert_eq!(first.domain, OdooTool::Customers.domain());
    }

    #[test]
    fn test_requested_limit() {
        assert_eq!(requested_limit(&json!({"limit": 10})), Some(10));
        assert_eq!(requested_limit(&json!({"limit": "7"})), Some(7));
        assert_eq!(requested_limit(&json!({"limit": 3.9})), Some(3));
        assert_eq!(requested_limit(&json!({"limit": 0.5})), None);
        assert_eq!(requested_limit(&json!({"limit": 0})), None);
        assert_eq!(requested_limit(&json!({"limit": -3})), None);
        assert_eq!(requested_limit(&json!({"limit": null})), None);
        assert_eq!(requested_limit(&Value::Null), None);
    }

    #[tokio::test]
    async fn test_empty_results_use_empty_messages() {
        let source = FakeSource::returning(vec![]);
        for tool in OdooTool::ALL {
            let text = call(tool.name(), None, &source).await;
            assert_eq!(text, tool.empty_message());
            assert!(!text.contains("0 "));
        }
    }

    #[tokio::test]
    async fn test_customers_formatting() {
        let source = FakeSource::returning(vec![
            json!({"id": 1, "name": "Azure Interior", "email": "azure@example.com", "phone": "+1 555 0100", "city": "Fremont"}),
            json!({"id": 2, "name": "Deco Addict", "email": false, "phone": false, "city": "Pleasant Hill"}),
        ]);

        let text = call("get_customers", None, &source).await;
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "**2 customers found:**");
        assert_eq!(text.matches("customers found").count(), 1);
        assert!(text.contains("**Azure Interior**\n   Email: azure@example.com\n   Phone: +1 555 0100\n   City: Fremont\n"));
        assert!(text.contains("**Deco Addict**\n   City: Pleasant Hill\n"));
        assert_eq!(text.matches("Phone:").count(), 1);
        assert!(!text.contains("false"));
    }

    #[tokio::test]
    async fn test_products_category_label() {
        let source = FakeSource::returning(vec![
            json!({"name": "Desk", "list_price": 150.0, "categ_id": [3, "All / Furniture"]}),
            json!({"name": "Chair", "list_price": 12.5, "categ_id": [4]}),
            json!({"name": "Lamp", "list_price": 30}),
        ]);

        let text = call("get_products", None, &source).await;

        assert!(text.starts_with("**3 products found:**\n\n"));
        assert!(text.contains("**Desk**\n   Price: $150\n   Category: All / Furniture\n"));
        assert!(text.contains("**Chair**\n   Price: $12.5\n\n"));
        assert!(text.contains("**Lamp**\n   Price: $30\n\n"));
        assert_eq!(text.matches("Category:").count(), 1);
    }

    #[tokio::test]
    async fn test_sale_orders_formatting() {
        let source = FakeSource::returning(vec![
            json!({"name": "S00021", "partner_id": [9, "Gemini Furniture"], "date_order": "2024-05-02 10:11:12", "amount_total": 2947.5, "state": "sale"}),
            json!({"name": "S00022", "partner_id": false, "date_order": "2024-05-03 08:00:00", "amount_total": 0.0, "state": "draft"}),
        ]);

        let text = call("get_sale_orders", None, &source).await;

        assert!(text.starts_with("**2 sale orders found:**"));
        assert!(text.contains(
            "**S00021**\n   Customer: Gemini Furniture\n   Date: 2024-05-02 10:11:12\n   Total: $2947.5\n   State: sale\n"
        ));
        assert!(text.contains("**S00022**\n   Date: 2024-05-03 08:00:00\n   Total: $0\n   State: draft\n"));
    }

    #[tokio::test]
    async fn test_users_status() {
        let source = FakeSource::returning(vec![
            json!({"name": "Old Admin", "login": "old", "email": false, "active": false, "last_activity_time": "2024-01-01"}),
            json!({"name": "Marc Demo", "login": "demo", "email": "mark.brown23@example.com", "active": true, "last_activity_time": "2024-06-01 09:00:00"}),
            json!({"name": "New Hire", "login": "new@example.com", "email": "new@example.com", "active": true}),
        ]);

        let text = call("get_users", None, &source).await;

        assert!(text.starts_with("**3 users found:**"));
        assert!(text.contains("**Old Admin**\n   Login: old\n   Status: inactive\n"));
        assert!(text.contains(
            "**Marc Demo**\n   Login: demo\n   Email: mark.brown23@example.com\n   Status: last seen: 2024-06-01 09:00:00\n"
        ));
        assert!(text.contains("**New Hire**\n   Login: new@example.com\n   Status: never logged in\n"));
    }

    #[test]
    fn test_display_values() {
        assert_eq!(display(Some(&json!(12.0))), "12");
        assert_eq!(display(Some(&json!(12.25))), "12.25");
        assert_eq!(display(Some(&json!(false))), "-");
        assert_eq!(display(None), "-");
        assert_eq!(relation_label(Some(&json!([1, "Label"]))), Some("Label".to_string()));
        assert_eq!(relation_label(Some(&json!([1]))), None);
        assert_eq!(relation_label(Some(&json!(false))), None);
    }
}
