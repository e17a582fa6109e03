//! Static guidance attached to detailed prediction responses

/// Confidence band label
pub fn confidence_interpretation(confidence: f64) -> &'static str {
    if confidence >= 0.9 {
        "Very High Confidence"
    } else if confidence >= 0.8 {
        "High Confidence"
    } else if confidence >= 0.7 {
        "Moderate Confidence"
    } else if confidence >= 0.6 {
        "Low Confidence"
    } else {
        "Very Low Confidence"
    }
}

/// Advice for a predicted label, always ending with the general disclaimers
pub fn health_recommendations(prediction: &str, confidence: f64) -> Vec<String> {
    let mut recommendations = if prediction.eq_ignore_ascii_case("healthy") {
        if confidence >= 0.8 {
            vec![
                "Your respiratory sounds appear normal.".to_string(),
                "Continue maintaining good respiratory health with regular exercise.".to_string(),
                "Monitor any changes in breathing patterns.".to_string(),
            ]
        } else {
            vec![
                "Results suggest normal respiratory function, but confidence is moderate.".to_string(),
                "Consider retaking the test with a clearer audio recording.".to_string(),
                "Monitor for any respiratory symptoms.".to_string(),
            ]
        }
    } else if confidence >= 0.8 {
        vec![
            format!("The analysis suggests possible {}.", prediction),
            "We strongly recommend consulting with a healthcare provider immediately.".to_string(),
            "Bring these results to your doctor for further evaluation.".to_string(),
        ]
    } else {
        vec![
            format!("The analysis suggests possible {}, but with moderate confidence.", prediction),
            "Consider retaking the test or consulting with a healthcare provider.".to_string(),
            "Monitor your symptoms and seek medical attention if they worsen.".to_string(),
        ]
    };

    recommendations.push(
        "This is an AI-powered screening tool and should not replace professional medical advice.".to_string(),
    );
    recommendations.push("Consult with a healthcare provider for proper diagnosis and treatment.".to_string());
    recommendations
}

/// Human-readable size, e.g. 1536 -> "1.5 KB"
pub fn format_file_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "0 B".to_string();
    }
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size_bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}
