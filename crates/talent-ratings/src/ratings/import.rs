use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::domain::{
    AssignmentId, AssignmentResponses, AssignmentStatus, CycleId, DepartmentId, Employee,
    EmployeeId, EvaluationAssignment, RaterType, SurveyResponse, TenantId, SCORE_MAX,
};
use super::scoring::round2;

/// Assignments and directory entries read from a survey export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseImport {
    pub assignments: Vec<AssignmentResponses>,
    pub employees: Vec<Employee>,
}

impl ResponseImport {
    pub fn response_count(&self) -> usize {
        self.assignments
            .iter()
            .map(|entry| entry.responses.len())
            .sum()
    }

    /// Fails when any assignment belongs to a cycle other than `cycle_id`.
    pub fn ensure_cycle(&self, cycle_id: &CycleId) -> Result<(), ResponseImportError> {
        match self
            .assignments
            .iter()
            .find(|entry| &entry.assignment.cycle_id != cycle_id)
        {
            Some(entry) => Err(ResponseImportError::ForeignCycle {
                assignment_id: entry.assignment.id.clone(),
                found: entry.assignment.cycle_id.clone(),
                expected: cycle_id.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[derive(Debug)]
pub enum ResponseImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, message: String },
    ForeignCycle {
        assignment_id: AssignmentId,
        found: CycleId,
        expected: CycleId,
    },
}

impl std::fmt::Display for ResponseImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseImportError::Io(err) => write!(f, "failed to read response export: {err}"),
            ResponseImportError::Csv(err) => write!(f, "invalid response CSV data: {err}"),
            ResponseImportError::InvalidRow { line, message } => {
                write!(f, "invalid response row at line {line}: {message}")
            }
            ResponseImportError::ForeignCycle {
                assignment_id,
                found,
                expected,
            } => write!(
                f,
                "assignment {assignment_id} belongs to cycle {found}, expected {expected}"
            ),
        }
    }
}

impl std::error::Error for ResponseImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResponseImportError::Io(err) => Some(err),
            ResponseImportError::Csv(err) => Some(err),
            ResponseImportError::InvalidRow { .. } | ResponseImportError::ForeignCycle { .. } => {
                None
            }
        }
    }
}

impl From<std::io::Error> for ResponseImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ResponseImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Reads one row per answered question. Rows sharing an assignment id are
/// grouped into a single assignment.
pub struct ResponseCsvImporter;

impl ResponseCsvImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        tenant_id: &TenantId,
    ) -> Result<ResponseImport, ResponseImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, tenant_id)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        tenant_id: &TenantId,
    ) -> Result<ResponseImport, ResponseImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let mut import = ResponseImport::default();
        let mut assignment_index: HashMap<AssignmentId, usize> = HashMap::new();
        let mut employee_index: HashMap<EmployeeId, usize> = HashMap::new();
        let mut record = csv::StringRecord::new();

        while csv_reader.read_record(&mut record)? {
            let line = record.position().map_or(0, csv::Position::line);
            let row: ResponseRow = record.deserialize(Some(&headers))?;

            let assignment = row.assignment();
            let position = match assignment_index.get(&assignment.id) {
                Some(position) => {
                    let existing = &import.assignments[*position].assignment;
                    if existing != &assignment {
                        return Err(ResponseImportError::InvalidRow {
                            line,
                            message: format!(
                                "assignment {} changes its metadata between rows",
                                assignment.id
                            ),
                        });
                    }
                    *position
                }
                None => {
                    assignment_index.insert(assignment.id.clone(), import.assignments.len());
                    import.assignments.push(AssignmentResponses {
                        assignment,
                        responses: Vec::new(),
                    });
                    import.assignments.len() - 1
                }
            };

            if let Some(employee) = row.employee(tenant_id) {
                match employee_index.get(&employee.id) {
                    Some(existing) => import.employees[*existing] = employee,
                    None => {
                        employee_index.insert(employee.id.clone(), import.employees.len());
                        import.employees.push(employee);
                    }
                }
            }

            let response = row
                .response()
                .map_err(|message| ResponseImportError::InvalidRow { line, message })?;
            if let Some(response) = response {
                import.assignments[position].responses.push(response);
            }
        }

        Ok(import)
    }
}

#[derive(Debug, Deserialize)]
struct ResponseRow {
    assignment_id: String,
    cycle_id: String,
    evaluator_id: String,
    evaluatee_id: String,
    rater_type: RaterType,
    status: AssignmentStatus,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    evaluatee_name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    department_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    question_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    competency_code: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    scale_max: Option<f64>,
    #[serde(default)]
    normalized_score: Option<f64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    text: Option<String>,
}

impl ResponseRow {
    fn assignment(&self) -> EvaluationAssignment {
        EvaluationAssignment {
            id: AssignmentId::from(self.assignment_id.as_str()),
            cycle_id: CycleId::from(self.cycle_id.as_str()),
            evaluator_id: EmployeeId::from(self.evaluator_id.as_str()),
            evaluatee_id: EmployeeId::from(self.evaluatee_id.as_str()),
            rater_type: self.rater_type,
            status: self.status,
        }
    }

    fn employee(&self, tenant_id: &TenantId) -> Option<Employee> {
        self.evaluatee_name.as_ref().map(|name| Employee {
            id: EmployeeId::from(self.evaluatee_id.as_str()),
            tenant_id: tenant_id.clone(),
            display_name: name.clone(),
            department_id: self.department_id.as_deref().map(DepartmentId::from),
        })
    }

    /// A row without a question only declares its assignment.
    fn response(&self) -> Result<Option<SurveyResponse>, String> {
        let Some(question_id) = &self.question_id else {
            return Ok(None);
        };

        Ok(Some(SurveyResponse {
            question_id: question_id.clone(),
            competency_code: self.competency_code.clone(),
            rating: self.rating,
            normalized_score: self.normalized()?,
            text: self.text.clone(),
        }))
    }

    fn normalized(&self) -> Result<Option<f64>, String> {
        if self.normalized_score.is_some() {
            return Ok(self.normalized_score);
        }
        match (self.rating, self.scale_max) {
            (Some(rating), Some(scale_max)) if scale_max > 0.0 => {
                Ok(Some(round2(rating / scale_max * SCORE_MAX)))
            }
            (Some(_), Some(scale_max)) => {
                Err(format!("scale_max must be positive (got {scale_max})"))
            }
            (rating, None) => Ok(rating),
            (None, Some(_)) => Ok(None),
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
