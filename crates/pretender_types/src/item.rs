//! Wire shapes for `putItem`/`getItem`/`updateItem`/`deleteItem`.

use engine::item_manager::{self, ReturnValues};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use types::{AttributeMap, AttributeValue};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutItemInput {
    pub table_name: String,
    pub item: AttributeMap,
    #[serde(default)]
    pub condition_expression: Option<String>,
    #[serde(default)]
    pub expression_attribute_names: HashMap<String, String>,
    #[serde(default)]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
    #[serde(default)]
    pub return_values: ReturnValues,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutItemOutput {
    #[serde(default)]
    pub attributes: Option<AttributeMap>,
}

impl From<PutItemInput> for item_manager::PutItemRequest {
    fn from(input: PutItemInput) -> Self {
        Self {
            table_name: input.table_name,
            item: input.item,
            condition_expression: input.condition_expression,
            expression_attribute_names: input.expression_attribute_names,
            expression_attribute_values: input.expression_attribute_values,
            return_values: input.return_values,
        }
    }
}

impl From<item_manager::PutItemResponse> for PutItemOutput {
    fn from(response: item_manager::PutItemResponse) -> Self {
        Self { attributes: response.attributes }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetItemInput {
    pub table_name: String,
    pub key: AttributeMap,
    #[serde(default)]
    pub projection_expression: Option<String>,
    #[serde(default)]
    pub expression_attribute_names: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetItemOutput {
    #[serde(default)]
    pub item: Option<AttributeMap>,
}

impl From<GetItemInput> for item_manager::GetItemRequest {
    fn from(input: GetItemInput) -> Self {
        Self {
            table_name: input.table_name,
            key: input.key,
            projection_expression: input.projection_expression,
            expression_attribute_names: input.expression_attribute_names,
        }
    }
}

impl From<item_manager::GetItemResponse> for GetItemOutput {
    fn from(response: item_manager::GetItemResponse) -> Self {
        Self { item: response.item }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemInput {
    pub table_name: String,
    pub key: AttributeMap,
    pub update_expression: String,
    #[serde(default)]
    pub condition_expression: Option<String>,
    #[serde(default)]
    pub expression_attribute_names: HashMap<String, String>,
    #[serde(default)]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
    #[serde(default)]
    pub return_values: ReturnValues,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemOutput {
    #[serde(default)]
    pub attributes: Option<AttributeMap>,
}

impl From<UpdateItemInput> for item_manager::UpdateItemRequest {
    fn from(input: UpdateItemInput) -> Self {
        Self {
            table_name: input.table_name,
            key: input.key,
            update_expression: input.update_expression,
            condition_expression: input.condition_expression,
            expression_attribute_names: input.expression_attribute_names,
            expression_attribute_values: input.expression_attribute_values,
            return_values: input.return_values,
        }
    }
}

impl From<item_manager::UpdateItemResponse> for UpdateItemOutput {
    fn from(response: item_manager::UpdateItemResponse) -> Self {
        Self { attributes: response.attributes }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteItemInput {
    pub table_name: String,
    pub key: AttributeMap,
    #[serde(default)]
    pub condition_expression: Option<String>,
    #[serde(default)]
    pub expression_attribute_names: HashMap<String, String>,
    #[serde(default)]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
    #[serde(default)]
    pub return_values: ReturnValues,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteItemOutput {
    #[serde(default)]
    pub attributes: Option<AttributeMap>,
}

impl From<DeleteItemInput> for item_manager::DeleteItemRequest {
    fn from(input: DeleteItemInput) -> Self {
        Self {
            table_name: input.table_name,
            key: input.key,
            condition_expression: input.condition_expression,
            expression_attribute_names: input.expression_attribute_names,
            expression_attribute_values: input.expression_attribute_values,
            return_values: input.return_values,
        }
    }
}

impl From<item_manager::DeleteItemResponse> for DeleteItemOutput {
    fn from(response: item_manager::DeleteItemResponse) -> Self {
        Self { attributes: response.attributes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_item_input_round_trips_camel_case() {
        let json = r#"{"tableName":"Orders","item":{"id":{"S":"o1"}},"returnValues":"ALL_OLD"}"#;
        let input: PutItemInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.table_name, "Orders");
        assert_eq!(input.return_values, ReturnValues::AllOld);
    }

    #[test]
    fn get_item_input_defaults_optional_fields() {
        let json = r#"{"tableName":"Orders","key":{"id":{"S":"o1"}}}"#;
        let input: GetItemInput = serde_json::from_str(json).unwrap();
        assert!(input.projection_expression.is_none());
        assert!(input.expression_attribute_names.is_empty());
    }
}
