//! Wire shapes for `transactGetItems`/`transactWriteItems`. The hosted
//! shape for a write item is a struct with exactly one of `put`/`update`/
//! `delete`/`conditionCheck` populated; `TryFrom` enforces that here since
//! serde's derive has no "exactly one of" constraint of its own.

use engine::transact::{TransactGetRequestItem, TransactGetResponse, TransactWriteOp, TransactWriteRequestItem};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use types::{AttributeMap, AttributeValue, Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactGetItem {
    pub table_name: String,
    pub key: AttributeMap,
    #[serde(default)]
    pub projection_expression: Option<String>,
    #[serde(default)]
    pub expression_attribute_names: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactGetItemsInput {
    pub transact_items: Vec<TransactGetItem>,
}

impl From<TransactGetItemsInput> for Vec<TransactGetRequestItem> {
    fn from(input: TransactGetItemsInput) -> Self {
        input
            .transact_items
            .into_iter()
            .map(|item| TransactGetRequestItem {
                table_name: item.table_name,
                key: item.key,
                projection_expression: item.projection_expression,
                expression_attribute_names: item.expression_attribute_names,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactGetItemResponse {
    #[serde(default)]
    pub item: Option<AttributeMap>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactGetItemsOutput {
    pub responses: Vec<TransactGetItemResponse>,
}

impl From<TransactGetResponse> for TransactGetItemsOutput {
    fn from(response: TransactGetResponse) -> Self {
        Self { responses: response.items.into_iter().map(|item| TransactGetItemResponse { item }).collect() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutTransactItem {
    pub table_name: String,
    pub item: AttributeMap,
    #[serde(default)]
    pub condition_expression: Option<String>,
    #[serde(default)]
    pub expression_attribute_names: HashMap<String, String>,
    #[serde(default)]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransactItem {
    pub table_name: String,
    pub key: AttributeMap,
    pub update_expression: String,
    #[serde(default)]
    pub condition_expression: Option<String>,
    #[serde(default)]
    pub expression_attribute_names: HashMap<String, String>,
    #[serde(default)]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTransactItem {
    pub table_name: String,
    pub key: AttributeMap,
    #[serde(default)]
    pub condition_expression: Option<String>,
    #[serde(default)]
    pub expression_attribute_names: HashMap<String, String>,
    #[serde(default)]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionCheckTransactItem {
    pub table_name: String,
    pub key: AttributeMap,
    pub condition_expression: String,
    #[serde(default)]
    pub expression_attribute_names: HashMap<String, String>,
    #[serde(default)]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactWriteItem {
    #[serde(default)]
    pub put: Option<PutTransactItem>,
    #[serde(default)]
    pub update: Option<UpdateTransactItem>,
    #[serde(default)]
    pub delete: Option<DeleteTransactItem>,
    #[serde(default)]
    pub condition_check: Option<ConditionCheckTransactItem>,
}

impl TryFrom<TransactWriteItem> for TransactWriteRequestItem {
    type Error = Error;

    fn try_from(item: TransactWriteItem) -> Result<Self> {
        let set_count =
            [item.put.is_some(), item.update.is_some(), item.delete.is_some(), item.condition_check.is_some()].into_iter().filter(|set| *set).count();
        if set_count != 1 {
            return Err(Error::validation(format!(
                "a transact write item must set exactly one of put/update/delete/conditionCheck, found {set_count}"
            )));
        }

        if let Some(put) = item.put {
            return Ok(Self {
                table_name: put.table_name,
                op: TransactWriteOp::Put { item: put.item, condition_expression: put.condition_expression },
                expression_attribute_names: put.expression_attribute_names,
                expression_attribute_values: put.expression_attribute_values,
            });
        }
        if let Some(update) = item.update {
            return Ok(Self {
                table_name: update.table_name,
                op: TransactWriteOp::Update {
                    key: update.key,
                    update_expression: update.update_expression,
                    condition_expression: update.condition_expression,
                },
                expression_attribute_names: update.expression_attribute_names,
                expression_attribute_values: update.expression_attribute_values,
            });
        }
        if let Some(delete) = item.delete {
            return Ok(Self {
                table_name: delete.table_name,
                op: TransactWriteOp::Delete { key: delete.key, condition_expression: delete.condition_expression },
                expression_attribute_names: delete.expression_attribute_names,
                expression_attribute_values: delete.expression_attribute_values,
            });
        }
        let condition_check = item.condition_check.expect("exactly one branch is set");
        Ok(Self {
            table_name: condition_check.table_name,
            op: TransactWriteOp::ConditionCheck { key: condition_check.key, condition_expression: condition_check.condition_expression },
            expression_attribute_names: condition_check.expression_attribute_names,
            expression_attribute_values: condition_check.expression_attribute_values,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactWriteItemsInput {
    pub transact_items: Vec<TransactWriteItem>,
}

impl TransactWriteItemsInput {
    pub fn into_request_items(self) -> Result<Vec<TransactWriteRequestItem>> {
        self.transact_items.into_iter().map(TryFrom::try_from).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactWriteItemsOutput {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transact_write_item_rejects_multiple_ops() {
        let item = TransactWriteItem {
            put: Some(PutTransactItem { table_name: "Orders".into(), item: AttributeMap::new(), ..Default::default() }),
            delete: Some(DeleteTransactItem { table_name: "Orders".into(), key: AttributeMap::new(), ..Default::default() }),
            ..Default::default()
        };
        assert!(TransactWriteRequestItem::try_from(item).is_err());
    }

    #[test]
    fn transact_write_item_converts_single_put() {
        let item = TransactWriteItem {
            put: Some(PutTransactItem { table_name: "Orders".into(), item: AttributeMap::new(), ..Default::default() }),
            ..Default::default()
        };
        let request = TransactWriteRequestItem::try_from(item).unwrap();
        assert_eq!(request.table_name, "Orders");
        assert!(matches!(request.op, TransactWriteOp::Put { .. }));
    }
}
