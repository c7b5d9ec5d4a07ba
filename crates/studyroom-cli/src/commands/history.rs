use studyroom_core::Database;

pub fn run(limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let sessions = db.recent_sessions(limit)?;
    println!("{}", serde_json::to_string_pretty(&sessions)?);
    Ok(())
}
