//! Employee directory
//!
//! Read-only source of employee identity and department. The access-control
//! core only queries it; employee records are owned elsewhere.

use crate::error::DirectoryError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Employee {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub department: Option<String>,
}

impl Employee {
    pub fn new(id: &str, display_name: &str, department: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            department: department.map(str::to_string),
        }
    }

    /// Trimmed department, `None` when blank
    pub fn department(&self) -> Option<&str> {
        self.department
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn get_employee(&self, id: &str) -> Result<Option<Employee>, DirectoryError>;

    async fn list_employees(&self) -> Result<Vec<Employee>, DirectoryError>;
}

/// Directory held in memory, optionally loaded from a JSON array file
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    employees: Vec<Employee>,
}

impl StaticDirectory {
    pub fn new(employees: Vec<Employee>) -> Self {
        Self { employees }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await.map_err(|e| {
            DirectoryError::Unavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        let employees: Vec<Employee> = serde_json::from_slice(&raw).map_err(|e| {
            DirectoryError::Unavailable(format!("cannot parse {}: {e}", path.display()))
        })?;

        tracing::info!(count = employees.len(), path = %path.display(), "Employee directory loaded");
        Ok(Self { employees })
    }
}

#[async_trait]
impl EmployeeDirectory for StaticDirectory {
    async fn get_employee(&self, id: &str) -> Result<Option<Employee>, DirectoryError> {
        Ok(self.employees.iter().find(|e| e.id == id).cloned())
    }

    async fn list_employees(&self) -> Result<Vec<Employee>, DirectoryError> {
        Ok(self.employees.clone())
    }
}

/// One listing of the directory, indexed for the lookups resolution needs.
#[derive(Debug, Clone, Default)]
pub struct DirectoryView {
    employees: Vec<Employee>,
    by_id: HashMap<String, usize>,
    departments: HashSet<String>,
}

impl DirectoryView {
    pub async fn capture(directory: &dyn EmployeeDirectory) -> Result<Self, DirectoryError> {
        Ok(Self::from_employees(directory.list_employees().await?))
    }

    pub fn from_employees(employees: Vec<Employee>) -> Self {
        let by_id = employees
            .iter()
            .enumerate()
            .map(|(idx, e)| (e.id.clone(), idx))
            .collect();
        let departments = employees
            .iter()
            .filter_map(|e| e.department().map(str::to_string))
            .collect();

        Self {
            employees,
            by_id,
            departments,
        }
    }

    pub fn employees(&self) -> &[Employee] {
        &self.employees
    }

    pub fn get(&self, id: &str) -> Option<&Employee> {
        self.by_id.get(id).map(|&idx| &self.employees[idx])
    }

    pub fn display_name(&self, id: &str) -> Option<String> {
        self.get(id).map(|e| e.display_name.clone())
    }

    pub fn has_department(&self, department: &str) -> bool {
        self.departments.contains(department)
    }

    /// Known employee ids only, de-duplicated, input order kept
    pub fn known_employee_ids(&self, ids: &[String]) -> Vec<String> {
        let mut kept: Vec<String> = Vec::new();
        for id in ids.iter().map(|id| id.trim()) {
            if self.by_id.contains_key(id) && !kept.iter().any(|k| k == id) {
                kept.push(id.to_string());
            }
        }
        kept
    }

    /// Known departments only, trimmed and de-duplicated, input order kept
    pub fn known_departments(&self, departments: &[String]) -> Vec<String> {
        let mut kept: Vec<String> = Vec::new();
        for department in departments.iter().map(|d| d.trim()) {
            if self.has_department(department) && !kept.iter().any(|k| k == department) {
                kept.push(department.to_string());
            }
        }
        kept
    }

    /// Sorted, distinct department names
    pub fn department_names(&self) -> Vec<String> {
        self.departments
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
