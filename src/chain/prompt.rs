//! Prompt construction and SQL extraction.

use crate::db::DatabaseType;

/// Stop sequence for the SQL generation call. The model would otherwise
/// hallucinate a result after its query.
pub const SQL_RESULT_STOP: &str = "\nSQLResult:";

const POSTGRES_INSTRUCTIONS: &str = "You are a PostgreSQL expert. Given an input question, first create a syntactically correct PostgreSQL query to run, then look at the results of the query and return the answer to the input question.
Unless the user specifies in the question a specific number of examples to obtain, query for at most {top_k} results using the LIMIT clause as per PostgreSQL. You can order the results to return the most informative data in the database.
Never query for all columns from a table. You must query only the columns that are needed to answer the question. Wrap each column name in double quotes (\") to denote them as delimited identifiers.
Pay attention to use only the column names you can see in the tables below. Be careful to not query for columns that do not exist. Also, pay attention to which column is in which table.
Pay attention to use CURRENT_DATE function to get the current date, if the question involves \"today\".";

const SQLITE_INSTRUCTIONS: &str = "You are a SQLite expert. Given an input question, first create a syntactically correct SQLite query to run, then look at the results of the query and return the answer to the input question.
Unless the user specifies in the question a specific number of examples to obtain, query for at most {top_k} results using the LIMIT clause as per SQLite. You can order the results to return the most informative data in the database.
Never query for all columns from a table. You must query only the columns that are needed to answer the question. Wrap each column name in double quotes (\") to denote them as delimited identifiers.
Pay attention to use only the column names you can see in the tables below. Be careful to not query for columns that do not exist. Also, pay attention to which column is in which table.
Pay attention to use date('now') function to get the current date, if the question involves \"today\".";

const RESPONSE_FORMAT: &str = "Use the following format:

Question: Question here
SQLQuery: SQL Query to run
SQLResult: Result of the SQLQuery
Answer: Final answer here

Only use the following tables:";

/// Build the SQL generation prompt. Ends with `SQLQuery:` so the model's
/// continuation is the query itself.
pub fn sql_prompt(db_type: DatabaseType, top_k: usize, table_info: &str, question: &str) -> String {
    let instructions = match db_type {
        DatabaseType::PostgreSQL => POSTGRES_INSTRUCTIONS,
        DatabaseType::SQLite => SQLITE_INSTRUCTIONS,
    };
    format!(
        "{}\n\n{}\n{}\n\nQuestion: {}\nSQLQuery:",
        instructions.replace("{top_k}", &top_k.to_string()),
        RESPONSE_FORMAT,
        table_info,
        question
    )
}

/// Extend the SQL prompt with the generated query and its result so the
/// model can phrase the final answer.
pub fn answer_prompt(sql_prompt: &str, sql: &str, sql_result: &str) -> String {
    format!("{} {}\nSQLResult: {}\nAnswer:", sql_prompt, sql, sql_result)
}

/// Pull the SQL statement out of a model completion.
///
/// Handles a repeated `SQLQuery:` marker, markdown code fences and any
/// trailing `SQLResult:` / `Answer:` sections.
pub fn extract_sql(completion: &str) -> String {
    let mut text = completion.trim();

    if let Some(start) = text.find("SQLQuery:") {
        text = &text[start + "SQLQuery:".len()..];
    }

    let end = ["SQLResult:", "Answer:"]
        .iter()
        .filter_map(|marker| text.find(marker))
        .min()
        .unwrap_or(text.len());
    text = text[..end].trim();

    strip_code_fence(text).trim().to_string()
}

/// Language tags models put after an opening fence.
const FENCE_LANGUAGES: &[&str] = &["sql", "postgresql", "postgres", "psql", "sqlite"];

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.rfind("```") {
        Some(close) => &rest[..close],
        None => rest,
    };
    // The tag ends at the first whitespace, on the fence line or not
    let tag_end = body.find(char::is_whitespace).unwrap_or(body.len());
    if FENCE_LANGUAGES
        .iter()
        .any(|lang| lang.eq_ignore_ascii_case(&body[..tag_end]))
    {
        &body[tag_end..]
    } else {
        body
    }
}
