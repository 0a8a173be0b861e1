//! Plain-text renderers for the terminal front end.

use std::fmt::Write as _;

use client_core::PatientListSnapshot;
use shared::{
    domain::ViewMode,
    protocol::{PatientRecord, YearPrediction},
};

const TABLE_HEADERS: [&str; 6] = ["ID", "Age", "BMI", "Cholesterol", "BP", "Glucose"];

pub fn render_predictions(predictions: &[YearPrediction]) -> String {
    if predictions.is_empty() {
        return "No predictions yet.\n".to_string();
    }
    let year_width = predictions
        .iter()
        .map(|entry| entry.year.len())
        .max()
        .unwrap_or(4)
        .max(4);
    let mut out = format!("{:<year_width$}  Label\n", "Year");
    for entry in predictions {
        let _ = writeln!(out, "{:<year_width$}  {}", entry.year, entry.label);
    }
    out
}

pub fn render_patient_list(snapshot: &PatientListSnapshot) -> String {
    let mut out = if snapshot.patients.is_empty() {
        "No patients found.\n".to_string()
    } else {
        match snapshot.view_mode {
            ViewMode::Table => render_table(&snapshot.patients),
            ViewMode::Card => render_cards(&snapshot.patients),
        }
    };
    let _ = writeln!(
        out,
        "page {} of {}",
        snapshot.displayed_page(),
        snapshot.total_pages.max(1)
    );
    out
}

pub fn render_patient(patient: &PatientRecord) -> String {
    let mut out = format!("Patient #{}\n", patient.patient_id);
    let _ = writeln!(out, "Age: {}", patient.age);
    let _ = writeln!(out, "BMI: {}", patient.bmi);
    let _ = writeln!(out, "Cholesterol: {}", patient.cholesterol);
    let _ = writeln!(out, "Blood Pressure: {}", patient.blood_pressure);
    let _ = writeln!(out, "Glucose: {}", patient.glucose);
    out
}

fn render_table(patients: &[PatientRecord]) -> String {
    let rows: Vec<[String; 6]> = patients
        .iter()
        .map(|p| {
            [
                format!("#{}", p.patient_id),
                p.age.to_string(),
                p.bmi.to_string(),
                p.cholesterol.to_string(),
                p.blood_pressure.to_string(),
                p.glucose.to_string(),
            ]
        })
        .collect();

    let mut widths = TABLE_HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &TABLE_HEADERS, &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row<S: AsRef<str>>(out: &mut String, cells: &[S], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{:<width$}", cell.as_ref()))
        .collect();
    let _ = writeln!(out, "{}", line.join("  ").trim_end());
}

fn render_cards(patients: &[PatientRecord]) -> String {
    let mut out = String::new();
    for (index, patient) in patients.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "Patient #{}", patient.patient_id);
        let _ = writeln!(out, "  Age: {}  BMI: {}", patient.age, patient.bmi);
        let _ = writeln!(
            out,
            "  Cholesterol: {}  Blood Pressure: {}  Glucose: {}",
            patient.cholesterol, patient.blood_pressure, patient.glucose
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use shared::{domain::PatientId, protocol::ListQuery};

    use super::*;

    fn snapshot(view_mode: ViewMode) -> PatientListSnapshot {
        PatientListSnapshot {
            query: ListQuery::default(),
            applied_query: Some(ListQuery::default()),
            patients: vec![PatientRecord {
                patient_id: PatientId(12),
                age: 45.0,
                bmi: 24.5,
                cholesterol: 200.0,
                blood_pressure: 130.0,
                glucose: 110.0,
            }],
            total_pages: 3,
            view_mode,
            loading: false,
            last_error: None,
        }
    }

    #[test]
    fn table_view_aligns_columns() {
        let text = render_patient_list(&snapshot(ViewMode::Table));
        assert_eq!(
            text,
            "ID   Age  BMI   Cholesterol  BP   Glucose\n\
             #12  45   24.5  200          130  110\n\
             page 1 of 3\n"
        );
    }

    #[test]
    fn card_view_shows_every_measurement() {
        let text = render_patient_list(&snapshot(ViewMode::Card));
        assert!(text.starts_with("Patient #12\n  Age: 45  BMI: 24.5\n"));
        assert!(text.contains("Blood Pressure: 130"));
        assert!(text.ends_with("page 1 of 3\n"));
    }

    #[test]
    fn empty_results_have_placeholders() {
        assert_eq!(render_predictions(&[]), "No predictions yet.\n");
        let mut empty = snapshot(ViewMode::Card);
        empty.patients.clear();
        empty.total_pages = 0;
        assert_eq!(
            render_patient_list(&empty),
            "No patients found.\npage 1 of 1\n"
        );
    }

    #[test]
    fn page_footer_follows_displayed_rows() {
        let mut stale = snapshot(ViewMode::Card);
        stale.applied_query = Some(ListQuery {
            page: 3,
            ..ListQuery::default()
        });
        stale.query.set_search("nobody");
        assert!(render_patient_list(&stale).ends_with("page 3 of 3\n"));
    }

    #[test]
    fn predictions_render_in_given_order() {
        let text = render_predictions(&[
            YearPrediction::new("2030", "Diabetes"),
            YearPrediction::new("2025", "Healthy"),
        ]);
        assert_eq!(text, "Year  Label\n2030  Diabetes\n2025  Healthy\n");
    }
}
