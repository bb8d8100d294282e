// Cross-course fan-out: list active courses, then ask each one in turn.

use super::{ApiClient, ApiError, EnrollmentState};
use crate::models::{sort_by_due_date, Assignment, Course, CourseGrades};

/// A course whose part of an aggregation could not be fetched.
#[derive(Debug)]
pub struct CourseFailure {
    pub course_id: u64,
    pub course_name: String,
    pub error: ApiError,
}

/// Merged results plus the courses that were skipped.
#[derive(Debug)]
pub struct Aggregated<T> {
    pub items: Vec<T>,
    pub failures: Vec<CourseFailure>,
}

impl ApiClient {
    /// Runs `fetch` for every course sequentially. A failing course is logged
    /// and recorded in `failures`; it never stops the loop.
    fn fan_out<T, F>(&self, courses: &[Course], what: &str, mut fetch: F) -> Aggregated<T>
    where
        F: FnMut(&Course) -> Result<Vec<T>, ApiError>,
    {
        let mut items = Vec::new();
        let mut failures = Vec::new();
        for course in courses {
            match fetch(course) {
                Ok(found) => items.extend(found),
                Err(error) => {
                    tracing::warn!(
                        course_id = course.id,
                        course = %course.name,
                        error = %error,
                        "Could not fetch {} for course", what
                    );
                    failures.push(CourseFailure {
                        course_id: course.id,
                        course_name: course.name.clone(),
                        error,
                    });
                }
            }
        }
        Aggregated { items, failures }
    }

    /// Assignments from every active course, tagged with their course and
    /// sorted by due date (undated last).
    pub fn all_assignments_detailed(&self) -> Result<Aggregated<Assignment>, ApiError> {
        let courses = self.courses(EnrollmentState::Active)?;
        let mut merged = self.fan_out(&courses, "assignments", |course| {
            let mut assignments = self.course_assignments(course.id)?;
            for a in &mut assignments {
                a.course_id = Some(course.id);
                a.course_name = Some(course.name.clone());
            }
            Ok(assignments)
        });
        sort_by_due_date(&mut merged.items);
        Ok(merged)
    }

    pub fn all_assignments(&self) -> Result<Vec<Assignment>, ApiError> {
        Ok(self.all_assignments_detailed()?.items)
    }

    /// Grades for every active course, in course order.
    pub fn all_grades_detailed(&self) -> Result<Aggregated<CourseGrades>, ApiError> {
        let courses = self.courses(EnrollmentState::Active)?;
        Ok(self.fan_out(&courses, "grades", |course| {
            let grades = self.course_grades(course.id)?;
            Ok(vec![CourseGrades {
                course_id: course.id,
                course_name: course.name.clone(),
                grades,
            }])
        }))
    }

    pub fn all_grades(&self) -> Result<Vec<CourseGrades>, ApiError> {
        Ok(self.all_grades_detailed()?.items)
    }
}
