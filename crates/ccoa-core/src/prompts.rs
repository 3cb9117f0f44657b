use ccoa_memory::QueryResult;

pub const NO_MATCH_ANSWER: &str =
    "I couldn't find any relevant information in the codebase to answer your question.";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const PLAN_EXAMPLE: &str = r#"{
  "learning_path": [
    {
      "step": 1,
      "title": "Project Setup & Core Frameworks",
      "description": "Understand the project's architecture, dependencies, and entry points. The backend is FastAPI and the frontend is React.",
      "files_to_review": ["package.json", "app/main.py", "docker-compose.yml"],
      "key_technologies": ["FastAPI", "React", "Docker"],
      "external_resources": [
        {"type": "YouTube", "suggestion": "Search for 'FastAPI full course for beginners'"},
        {"type": "Blog", "suggestion": "Read about 'React functional components vs class components'"},
        {"type": "Official Docs", "suggestion": "Review the 'Docker Compose getting started' guide"}
      ]
    }
  ],
  "starter_tasks": [
    {
      "title": "Improve API Documentation",
      "description": "Add detailed docstrings and examples to the models in `app/models/schemas.py`.",
      "suggested_files": ["app/models/schemas.py"]
    }
  ]
}"#;

/// Planning prompt for a repository described by its structure listing.
#[must_use]
pub fn planning_prompt(repo_structure: &str) -> String {
    format!(
        "You are an expert Staff Engineer and mentor responsible for onboarding new developers.
Based on the following file structure, generate a comprehensive and actionable learning path.
Your output MUST be a single, valid JSON object. Do not include any text, markdown, or explanations outside of the JSON.

For each step in the \"learning_path\", you must:
1. Provide a clear title and description.
2. List the most relevant files to review for that step.
3. Identify the key technologies or concepts (e.g., FastAPI, React Hooks, Docker).
4. Provide a list of \"external_resources\". For each resource, suggest a search query for finding high-quality tutorials, blogs, or official documentation. Do NOT provide real URLs. Frame it as a suggested search.

Also suggest a few \"starter_tasks\" suitable for a first contribution.

Repository File Structure:
{repo_structure}

Example JSON output structure:
{PLAN_EXAMPLE}"
    )
}

/// Join retrieved chunks into the context block, best match first.
#[must_use]
pub fn format_context(result: &QueryResult) -> String {
    result
        .iter()
        .map(|(doc, meta, _)| format!("Source File: {}\n\nContent:\n{doc}", meta.file_path))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Chat prompt over retrieved codebase context.
#[must_use]
pub fn chat_prompt(context: &str, query: &str) -> String {
    format!(
        "You are a helpful and brilliant AI assistant. Your primary goal is to help the user.

- If the user's question is about the specifics of the codebase, answer based ONLY on the provided \"Context from the codebase\" below.
- If the user asks for external resources, tutorials, YouTube videos, or general knowledge, search the web to find relevant and current information.
- **CRITICAL**: When generating code snippets, ALWAYS wrap them in Markdown code fences with the language specified.

---
**Context from the codebase:**
{context}
---

**User's Question:**
{query}"
    )
}

#[must_use]
pub fn onboarded_message(repo_url: &str) -> String {
    format!("Successfully onboarded {repo_url}. You can now start asking questions.")
}
