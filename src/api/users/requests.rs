//! Request schemas for the users endpoints
//!
//! Each schema validates itself and reports every failed rule, so a single
//! 400 response lists all problems with the payload.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::storage::{Filter, FilterOperator, SortDirection, CREATED_AT_FIELD};
use crate::domain::user::schema::{
    BIRTH_DATE_FIELD, EMAIL_FIELD, FIRST_NAME_FIELD, LAST_NAME_FIELD, MARKETING_SOURCE_FIELD,
    PHONE_FIELD, STATUS_FIELD,
};
use crate::domain::user::{
    cast_filter_value, parse_iso_date, validate_email, validate_not_empty, validate_phone,
};
use crate::domain::{NewUser, UserPatch, UserValidationError};
use crate::infrastructure::user::ListUsersParams;

pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;
pub const DEFAULT_PAGE: u64 = 1;

/// `field` or `field[op]`
static FILTER_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(?:\[([a-z]+)\])?$").expect("filter key is a valid regex")
});

/// Body of `POST /users`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub marketing_source: Option<String>,
    pub birth_date: Option<String>,
    pub status: Option<String>,
}

/// Body of `PATCH /users/{id}`. Unknown and store-managed fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub marketing_source: Option<String>,
    pub birth_date: Option<String>,
    pub status: Option<String>,
}

/// Collects failures while checking a payload field by field
#[derive(Default)]
struct Checks {
    errors: Vec<String>,
}

impl Checks {
    fn record<T>(&mut self, result: Result<T, UserValidationError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.errors.push(e.to_string());
                None
            }
        }
    }

    fn required(&mut self, field: &str, value: Option<String>) -> Option<String> {
        match value {
            Some(value) => self.non_empty(field, value),
            None => {
                self.errors
                    .push(UserValidationError::MissingField(field.to_string()).to_string());
                None
            }
        }
    }

    fn non_empty(&mut self, field: &str, value: String) -> Option<String> {
        self.record(validate_not_empty(field, &value))?;
        Some(value)
    }

    fn email(&mut self, value: String) -> Option<String> {
        self.record(validate_email(&value))?;
        Some(value)
    }

    fn phone(&mut self, value: String) -> Option<String> {
        self.record(validate_phone(&value))?;
        Some(value)
    }

    fn birth_date(&mut self, value: String) -> Option<chrono::DateTime<chrono::Utc>> {
        self.record(parse_iso_date(BIRTH_DATE_FIELD, &value))
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, Vec<String>> {
        if self.errors.is_empty() {
            Ok(value())
        } else {
            Err(self.errors)
        }
    }
}

impl CreateUserRequest {
    pub fn validate(self) -> Result<NewUser, Vec<String>> {
        let mut checks = Checks::default();

        let first_name = checks.required(FIRST_NAME_FIELD, self.first_name);
        let last_name = checks.required(LAST_NAME_FIELD, self.last_name);
        let email = checks
            .required(EMAIL_FIELD, self.email)
            .and_then(|email| checks.email(email));
        let phone = checks
            .required(PHONE_FIELD, self.phone)
            .and_then(|phone| checks.phone(phone));
        let marketing_source = self
            .marketing_source
            .and_then(|source| checks.non_empty(MARKETING_SOURCE_FIELD, source));
        let status = self
            .status
            .and_then(|status| checks.non_empty(STATUS_FIELD, status));
        let birth_date = checks
            .required(BIRTH_DATE_FIELD, self.birth_date)
            .and_then(|date| checks.birth_date(date));

        checks.finish(|| NewUser {
            first_name: first_name.unwrap_or_default(),
            last_name: last_name.unwrap_or_default(),
            email: email.unwrap_or_default(),
            phone: phone.unwrap_or_default(),
            marketing_source,
            birth_date: birth_date.unwrap_or_default(),
            status,
        })
    }
}

impl UpdateUserRequest {
    pub fn validate(self) -> Result<UserPatch, Vec<String>> {
        let mut checks = Checks::default();

        let patch = UserPatch {
            first_name: self
                .first_name
                .and_then(|v| checks.non_empty(FIRST_NAME_FIELD, v)),
            last_name: self
                .last_name
                .and_then(|v| checks.non_empty(LAST_NAME_FIELD, v)),
            email: self.email.and_then(|v| checks.email(v)),
            phone: self.phone.and_then(|v| checks.phone(v)),
            marketing_source: self
                .marketing_source
                .and_then(|v| checks.non_empty(MARKETING_SOURCE_FIELD, v)),
            birth_date: self.birth_date.and_then(|v| checks.birth_date(v)),
            status: self.status.and_then(|v| checks.non_empty(STATUS_FIELD, v)),
            is_deleted: None,
        };

        checks.finish(|| patch)
    }
}

/// Query string of `GET /users`
#[derive(Debug, Clone, PartialEq)]
pub struct ListUsersQuery {
    pub limit: u64,
    pub page: u64,
    pub sort: SortDirection,
    pub sort_by: String,
    pub filters: Vec<Filter>,
}

impl ListUsersQuery {
    /// Parse raw query pairs. Keys other than the paging ones become filters.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();
        let mut query = Self {
            limit: DEFAULT_LIMIT,
            page: DEFAULT_PAGE,
            sort: SortDirection::Asc,
            sort_by: CREATED_AT_FIELD.to_string(),
            filters: Vec::new(),
        };

        for (key, value) in pairs {
            match key.as_str() {
                "limit" => match value.parse::<u64>() {
                    Ok(limit) if (1..=MAX_LIMIT).contains(&limit) => query.limit = limit,
                    _ => errors.push(format!(
                        "limit must be an integer between 1 and {}",
                        MAX_LIMIT
                    )),
                },
                "page" => match value.parse::<u64>() {
                    Ok(page) if page >= 1 => query.page = page,
                    _ => errors.push("page must be a positive integer".to_string()),
                },
                "sort" => match SortDirection::from_str(&value) {
                    Some(sort) => query.sort = sort,
                    None => errors.push("sort must be one of: asc, desc, 1, -1".to_string()),
                },
                "sortBy" => {
                    if is_field_name(&value) {
                        query.sort_by = value;
                    } else {
                        errors.push("sortBy must be a field name".to_string());
                    }
                }
                _ => match parse_filter(&key, &value) {
                    Ok(filter) => query.filters.push(filter),
                    Err(message) => errors.push(message),
                },
            }
        }

        if errors.is_empty() {
            Ok(query)
        } else {
            Err(errors)
        }
    }

    pub fn into_params(self) -> ListUsersParams {
        ListUsersParams {
            limit: self.limit,
            page: self.page,
            sort: self.sort,
            sort_by: self.sort_by,
            filters: self.filters,
        }
    }
}

fn is_field_name(value: &str) -> bool {
    FILTER_KEY
        .captures(value)
        .is_some_and(|caps| caps.get(2).is_none())
}

fn parse_filter(key: &str, value: &str) -> Result<Filter, String> {
    let caps = FILTER_KEY
        .captures(key)
        .ok_or_else(|| format!("Invalid filter '{}'", key))?;
    let field = &caps[1];

    let operator = match caps.get(2) {
        None => FilterOperator::Eq,
        Some(op) => FilterOperator::from_str(op.as_str())
            .ok_or_else(|| format!("Unsupported filter operator '{}'", op.as_str()))?,
    };

    let value = cast_filter_value(field, value).map_err(|e| e.to_string())?;
    Ok(Filter::condition(field, operator, value))
}

/// One page of results, echoing the paging parameters
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub limit: u64,
    pub page: u64,
    pub sort: &'static str,
    pub sort_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn daniel() -> CreateUserRequest {
        serde_json::from_value(json!({
            "firstName": "Daniel",
            "lastName": "Alanis",
            "email": "dalanis@nestjs.com",
            "phone": "(555) 555-5555",
            "status": "Lead",
            "marketingSource": "Facebook",
            "birthDate": "1990-01-01"
        }))
        .unwrap()
    }

    #[test]
    fn test_create_request_valid() {
        let user = daniel().validate().unwrap();

        assert_eq!(user.first_name, "Daniel");
        assert_eq!(user.marketing_source.as_deref(), Some("Facebook"));
        assert_eq!(user.birth_date.to_rfc3339(), "1990-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_create_request_reports_every_failure() {
        let request = CreateUserRequest {
            email: Some("not-an-email".to_string()),
            phone: Some("555-555-5555".to_string()),
            birth_date: Some("yesterday".to_string()),
            ..daniel()
        };

        let errors = request.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![
                "email must be an email".to_string(),
                "Invalid phone number format".to_string(),
                "birthDate must be a valid ISO 8601 date string".to_string(),
            ]
        );
    }

    #[test]
    fn test_create_request_missing_fields() {
        let errors = CreateUserRequest::default().validate().unwrap_err();

        assert!(errors.contains(&"firstName is required".to_string()));
        assert!(errors.contains(&"birthDate is required".to_string()));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_create_request_empty_optional_field() {
        let request = CreateUserRequest {
            status: Some(String::new()),
            ..daniel()
        };

        assert_eq!(
            request.validate().unwrap_err(),
            vec!["status should not be empty".to_string()]
        );
    }

    #[test]
    fn test_update_request_ignores_store_managed_fields() {
        let request: UpdateUserRequest = serde_json::from_value(json!({
            "status": "Customer",
            "isDeleted": true,
            "_id": "65a1b2c3d4e5f60718293a4b",
            "createdAt": "2020-01-01T00:00:00Z",
            "notes": "vip"
        }))
        .unwrap();

        let patch = request.validate().unwrap();
        assert_eq!(patch.status.as_deref(), Some("Customer"));
        assert_eq!(patch.is_deleted, None);
        assert_eq!(patch.first_name, None);
    }

    #[test]
    fn test_update_request_checks_phone_pattern() {
        let request = UpdateUserRequest {
            phone: Some("5555555555".to_string()),
            ..Default::default()
        };

        assert_eq!(
            request.validate().unwrap_err(),
            vec!["Invalid phone number format".to_string()]
        );
    }

    #[test]
    fn test_list_query_defaults() {
        let query = ListUsersQuery::from_pairs(Vec::new()).unwrap();

        assert_eq!(query.limit, DEFAULT_LIMIT);
        assert_eq!(query.page, DEFAULT_PAGE);
        assert_eq!(query.sort, SortDirection::Asc);
        assert_eq!(query.sort_by, "createdAt");
        assert!(query.filters.is_empty());
    }

    #[test]
    fn test_list_query_paging_and_sort() {
        let query = ListUsersQuery::from_pairs(pairs(&[
            ("limit", "2"),
            ("page", "3"),
            ("sort", "-1"),
            ("sortBy", "firstName"),
        ]))
        .unwrap();

        assert_eq!(query.limit, 2);
        assert_eq!(query.page, 3);
        assert_eq!(query.sort, SortDirection::Desc);
        assert_eq!(query.sort_by, "firstName");
    }

    #[test]
    fn test_list_query_rejects_bad_paging() {
        let errors = ListUsersQuery::from_pairs(pairs(&[
            ("limit", "0"),
            ("page", "zero"),
            ("sort", "up"),
        ]))
        .unwrap_err();

        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_list_query_filters() {
        let query = ListUsersQuery::from_pairs(pairs(&[
            ("status", "Lead"),
            ("birthDate[gte]", "1990-01-01"),
        ]))
        .unwrap();

        assert_eq!(
            query.filters,
            vec![
                Filter::eq("status", "Lead"),
                Filter::condition(
                    "birthDate",
                    FilterOperator::Gte,
                    json!("1990-01-01T00:00:00.000Z")
                ),
            ]
        );
    }

    #[test]
    fn test_list_query_rejects_unknown_operator() {
        let errors = ListUsersQuery::from_pairs(pairs(&[("status[regex]", "L.*")])).unwrap_err();
        assert_eq!(errors, vec!["Unsupported filter operator 'regex'".to_string()]);
    }

    #[test]
    fn test_list_query_rejects_bad_filter_value() {
        let errors = ListUsersQuery::from_pairs(pairs(&[("isDeleted", "maybe")])).unwrap_err();
        assert_eq!(errors, vec!["isDeleted must be a boolean value".to_string()]);
    }

    #[test]
    fn test_paginated_response_shape() {
        let response = PaginatedResponse::<u8> {
            data: vec![],
            limit: 10,
            page: 1,
            sort: SortDirection::Asc.as_str(),
            sort_by: "createdAt".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"data": [], "limit": 10, "page": 1, "sort": "asc", "sortBy": "createdAt"})
        );
    }
}
