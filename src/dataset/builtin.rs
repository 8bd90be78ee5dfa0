// src/dataset/builtin.rs
//
// The six emigrant datasets.

use super::{Category, ChartKind, DatasetDescriptor};

pub fn all() -> Vec<DatasetDescriptor> {
    vec![
        civil_status(),
        sex(),
        age(),
        occupation(),
        education(),
        destination(),
    ]
}

pub fn civil_status() -> DatasetDescriptor {
    DatasetDescriptor {
        name: "civil-status".into(),
        title: "Emigrants by Civil Status".into(),
        collection: "emigrant_civil_status".into(),
        chart: ChartKind::Bar,
        categories: vec![
            Category::new("single", "Single"),
            Category::new("married", "Married"),
            Category::new("widower", "Widower").alias("widowed"),
            Category::new("separated", "Separated"),
            Category::new("divorced", "Divorced"),
            Category::new("notReported", "Not Reported"),
        ],
    }
}

pub fn sex() -> DatasetDescriptor {
    DatasetDescriptor {
        name: "sex".into(),
        title: "Emigrants by Sex".into(),
        collection: "emigrant_sex".into(),
        chart: ChartKind::Line,
        categories: vec![
            Category::new("male", "Male"),
            Category::new("female", "Female"),
        ],
    }
}

pub fn age() -> DatasetDescriptor {
    const BANDS: [(&str, &str); 13] = [
        ("14-below", "14 - Below"),
        ("15-19", "15 - 19"),
        ("20-24", "20 - 24"),
        ("25-29", "25 - 29"),
        ("30-34", "30 - 34"),
        ("35-39", "35 - 39"),
        ("40-44", "40 - 44"),
        ("45-49", "45 - 49"),
        ("50-54", "50 - 54"),
        ("55-59", "55 - 59"),
        ("60-64", "60 - 64"),
        ("65-69", "65 - 69"),
        ("70-above", "70 - Above"),
    ];
    DatasetDescriptor {
        name: "age".into(),
        title: "Emigrants by Age Group".into(),
        collection: "emigrant_age".into(),
        chart: ChartKind::Area,
        categories: BANDS
            .iter()
            .map(|(key, label)| Category::new(key, label))
            .collect(),
    }
}

pub fn occupation() -> DatasetDescriptor {
    DatasetDescriptor {
        name: "occupation".into(),
        title: "Emigrants by Major Occupation".into(),
        collection: "emigrant_occupation".into(),
        chart: ChartKind::Treemap,
        categories: vec![
            Category::new("professional", "Professional, Technical, and Related Workers"),
            Category::new("managerial", "Managerial, Executive, and Administrative Workers"),
            Category::new("clerical", "Clerical Workers"),
            Category::new("sales", "Sales Workers"),
            Category::new("service", "Service Workers"),
            Category::new(
                "agriculture",
                "Agri, Animal Husbandry, Forestry Workers & Fishermen",
            ),
            Category::new(
                "production",
                "Production Process, Transport Equipment Operators, & Laborers",
            ),
            Category::new("armedForces", "Members of the Armed Forces"),
            Category::new("housewives", "Housewives"),
            Category::new("retirees", "Retirees"),
            Category::new("students", "Students"),
            Category::new("minors", "Minors (Below 7 years old)"),
            Category::new("outOfSchoolYouth", "Out of School Youth"),
            Category::new("noOccupationReported", "No Occupation Reported"),
        ],
    }
}

/// Education keys are camelCase "safe" names; the labels are what spreadsheets use.
pub fn education() -> DatasetDescriptor {
    DatasetDescriptor {
        name: "education".into(),
        title: "Emigrants by Educational Attainment".into(),
        collection: "emigrant_education".into(),
        chart: ChartKind::Bar,
        categories: vec![
            Category::new("notOfSchoolingAge", "Not of Schooling Age"),
            Category::new("noFormalEducation", "No Formal Education"),
            Category::new("elementaryLevel", "Elementary Level"),
            Category::new("elementaryGraduate", "Elementary Graduate"),
            Category::new("highSchoolLevel", "High School Level"),
            Category::new("highSchoolGraduate", "High School Graduate"),
            Category::new("vocationalLevel", "Vocational Level"),
            Category::new("vocationalGraduate", "Vocational Graduate"),
            Category::new("collegeLevel", "College Level"),
            Category::new("collegeGraduate", "College Graduate"),
            Category::new("postGraduateLevel", "Post Graduate Level"),
            Category::new("postGraduate", "Post Graduate"),
            Category::new("nonFormalEducation", "Non-Formal Education"),
            Category::new("notReported", "Not Reported / No Response")
                .alias("Not Reported")
                .alias("No Response"),
        ],
    }
}

pub fn destination() -> DatasetDescriptor {
    DatasetDescriptor {
        name: "destination".into(),
        title: "Emigrants by Major Country of Destination".into(),
        collection: "emigrant_destination".into(),
        chart: ChartKind::Choropleth,
        categories: vec![
            Category::new("usa", "United States of America")
                .alias("USA")
                .alias("United States"),
            Category::new("canada", "Canada"),
            Category::new("japan", "Japan"),
            Category::new("australia", "Australia"),
            Category::new("italy", "Italy"),
            Category::new("newZealand", "New Zealand"),
            Category::new("unitedKingdom", "United Kingdom").alias("UK"),
            Category::new("germany", "Germany"),
            Category::new("southKorea", "South Korea").alias("Korea"),
            Category::new("spain", "Spain"),
            Category::new("others", "Others"),
        ],
    }
}
