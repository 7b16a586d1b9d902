//! ABOUTME: Pure functions producing LLM prompts for every pipeline stage
//! ABOUTME: Every interpolated value is passed through sanitize_xml_input

use research_core::Mode;
use research_utils::sanitize_xml_input;

/// Mode-specific system-prompt extension bullets, appended after the
/// base system prompt for non-chat modes.
pub fn mode_extension(mode: Mode) -> &'static str {
    match mode {
        Mode::Chat => "- Respond conversationally and concisely.",
        Mode::Knowledge => {
            "- Ground answers in retrieved knowledge-base content.\n\
             - Prefer precise citations over generalisation."
        }
        Mode::Search => {
            "- Synthesize information from multiple web search results.\n\
             - Cite sources using [number] format."
        }
        Mode::Code => {
            "- Write correct, runnable code and explain non-obvious choices.\n\
             - Prefer the language and style already present in the codebase."
        }
        Mode::Thinking => {
            "- Reason step by step before answering.\n\
             - Surface assumptions explicitly."
        }
        Mode::DeepResearch => {
            "- Conduct exhaustive, multi-step research with structured output.\n\
             - Maintain a clear evidence hierarchy and cite every claim."
        }
        Mode::Auto => "",
    }
}

pub fn report_plan_prompt(query: &str) -> String {
    let q = sanitize_xml_input(query);
    format!(
        "Given the following query from the user:\n\
         <QUERY>\n{q}\n</QUERY>\n\n\
         Generate a list of sections for the report based on the topic.\n\
         Your plan should be tight and focused with NO overlapping sections or \
         unnecessary filler. Each section needs a sentence summarizing its content.\n\n\
         {guidelines}\n\n\
         Before submitting, review your structure to ensure it has no redundant \
         sections and follows a logical flow.",
        guidelines = guidelines_prompt(),
    )
}

pub fn guidelines_prompt() -> &'static str {
    "Use `##` markdown headings for each top-level section. Prefer 4-7 sections \
     covering distinct, non-overlapping aspects of the topic."
}

pub fn serp_query_schema_prompt(output_schema: &serde_json::Value) -> String {
    let schema_json =
        serde_json::to_string_pretty(output_schema).unwrap_or_else(|_| "{}".to_string());
    format!(
        "You MUST respond in **JSON** matching this **JSON schema**:\n\n\
         ```json\n{schema_json}\n```\n\n\
         Expected output:\n\n\
         ```json\n[\n  {{\n    \"query\": \"This is a sample query.\",\n    \
         \"researchGoal\": \"This is the reason for the query.\",\n    \
         \"priority\": 1\n  }}\n]\n```"
    )
}

pub fn serp_queries_prompt(plan: &str, output_schema: &serde_json::Value, query_budget: u32) -> String {
    let p = sanitize_xml_input(plan);
    let schema_prompt = serp_query_schema_prompt(output_schema);
    format!(
        "This is the report plan:\n<PLAN>\n{p}\n</PLAN>\n\n\
         Generate exactly {query_budget} search queries to research this topic. Rules:\n\
         - Each query is a SHORT keyword phrase (3-8 words) optimized for search engines\n\
         - NOT a research question or full sentence\n\
         - Cover different aspects/domains proportionally\n\
         - Each query must be unique and target distinct information\n\
         - Prioritize queries by information density potential (highest priority = 1)\n\n\
         {schema_prompt}"
    )
}

/// Domain-aware variant: appends each domain's name/weight/angles with
/// an instruction to distribute queries proportionally.
pub fn serp_queries_with_domains_prompt(
    plan: &str,
    domains: &[research_core::Domain],
    output_schema: &serde_json::Value,
    query_budget: u32,
) -> String {
    let base = serp_queries_prompt(plan, output_schema, query_budget);
    let mut domain_block = String::from("\n\nResearch domains (distribute queries proportional to weight):\n");
    for d in domains {
        domain_block.push_str(&format!(
            "- {} (weight {:.2}): {}\n",
            sanitize_xml_input(&d.name),
            d.weight,
            d.search_angles.join(", ")
        ));
    }
    base + &domain_block
}

pub fn domain_identification_prompt(query: &str, plan: &str) -> String {
    let q = sanitize_xml_input(query);
    let p = sanitize_xml_input(plan);
    format!(
        "Given the query:\n<QUERY>\n{q}\n</QUERY>\n\nAnd the report plan:\n<PLAN>\n{p}\n</PLAN>\n\n\
         Identify 2-5 distinct research domains this topic spans. Respond as a JSON array \
         of objects with `name`, `weight` (all weights must sum to 1.0), and `searchAngles` \
         (2-4 strings each)."
    )
}

pub fn query_result_prompt(query: &str, research_goal: &str) -> String {
    let q = sanitize_xml_input(query);
    let rg = sanitize_xml_input(research_goal);
    format!(
        "Please use the following query to get the latest information via the web:\n\
         <QUERY>\n{q}\n</QUERY>\n\n\
         You need to organize the searched information according to the following requirements:\n\
         <RESEARCH_GOAL>\n{rg}\n</RESEARCH_GOAL>\n\n\
         Think like a human researcher. Generate a list of learnings from the search results. \
         Make sure each learning is unique, to the point, and information-dense. Include \
         entities, metrics, numbers, and dates when available."
    )
}

pub fn citation_rules() -> &'static str {
    "Citation Rules:\n\n\
     - Cite the context at the end of sentences when appropriate.\n\
     - Use the citation number [number] to reference the context in corresponding parts of your answer.\n\
     - If a sentence comes from multiple contexts, list all relevant citation numbers, e.g., [1][2]. \
     Do not group citations at the end."
}

pub fn search_result_prompt(query: &str, research_goal: &str, context: &str) -> String {
    let q = sanitize_xml_input(query);
    let rg = sanitize_xml_input(research_goal);
    let ctx = sanitize_xml_input(context);
    format!(
        "Given the following contexts from a search for the query:\n<QUERY>\n{q}\n</QUERY>\n\n\
         Organize the searched information according to the following requirements:\n\
         <RESEARCH_GOAL>\n{rg}\n</RESEARCH_GOAL>\n\n\
         The following context from the search:\n<CONTEXT>\n{ctx}\n</CONTEXT>\n\n\
         Generate a list of unique, information-dense learnings from the contexts."
    )
}

pub fn review_prompt(
    plan: &str,
    learnings: &str,
    suggestion: &str,
    output_schema: &serde_json::Value,
    remaining_budget: u32,
) -> String {
    let p = sanitize_xml_input(plan);
    let l = sanitize_xml_input(learnings);
    let s = sanitize_xml_input(suggestion);
    let schema_prompt = serp_query_schema_prompt(output_schema);
    format!(
        "This is the report plan:\n<PLAN>\n{p}\n</PLAN>\n\n\
         Here are all the learnings from previous research:\n<LEARNINGS>\n{l}\n</LEARNINGS>\n\n\
         This is the user's suggestion for research direction, if any:\n<SUGGESTION>\n{s}\n</SUGGESTION>\n\n\
         Based on previous research, determine whether further research is needed.\n\
         If further research is needed, generate at most {remaining_budget} follow-up queries to fill \
         specific knowledge gaps. Rules:\n\
         - Each query is a SHORT keyword phrase (3-8 words)\n\
         - Target ONLY the gaps not covered by existing learnings\n\
         - If no significant gaps remain, output an empty array []\n\n\
         {schema_prompt}"
    )
}

/// Follow-up variant that enumerates every already-executed query with
/// an explicit "do NOT repeat these" instruction.
pub fn followup_queries_prompt(
    plan: &str,
    learnings: &str,
    executed_queries: &[String],
    output_schema: &serde_json::Value,
    remaining_budget: u32,
) -> String {
    let base = review_prompt(plan, learnings, "", output_schema, remaining_budget);
    let mut executed_block =
        String::from("\n\nDo NOT repeat any of the following already-executed queries:\n");
    for q in executed_queries {
        executed_block.push_str(&format!("- {}\n", sanitize_xml_input(q)));
    }
    base + &executed_block
}

pub fn completeness_review_prompt(plan: &str, results_summary: &str, iteration: u32) -> String {
    let p = sanitize_xml_input(plan);
    let r = sanitize_xml_input(results_summary);
    format!(
        "This is iteration {iteration} of research against the plan:\n<PLAN>\n{p}\n</PLAN>\n\n\
         Here is what has been found so far:\n<FINDINGS>\n{r}\n</FINDINGS>\n\n\
         Assess research completeness. Respond as JSON: {{\"isSufficient\": bool, \
         \"overallCoverage\": 0-100, \"sections\": [{{\"name\", \"coverage\", \"depth\", \"gaps\"}}], \
         \"priorityGaps\": [string]}}. Start your response with YES or NO."
    )
}

pub fn intermediate_synthesis_prompt(
    query: &str,
    report_plan: &str,
    wave_results: &str,
    previous_synthesis: Option<&str>,
) -> String {
    let q = sanitize_xml_input(query);
    let p = sanitize_xml_input(report_plan);
    let w = sanitize_xml_input(wave_results);
    let prev = previous_synthesis
        .map(|s| format!("\n\nPrior synthesis to integrate with:\n<PRIOR>\n{}\n</PRIOR>", sanitize_xml_input(s)))
        .unwrap_or_default();
    format!(
        "Query:\n<QUERY>\n{q}\n</QUERY>\n\nReport plan:\n<PLAN>\n{p}\n</PLAN>\n\n\
         New findings from this research wave:\n<FINDINGS>\n{w}\n</FINDINGS>{prev}\n\n\
         Integrate the new findings with any prior understanding. Respond as JSON: \
         {{\"synthesis\": string, \"sectionCoverage\": object, \"knowledgeGaps\": [string], \
         \"crossDomainLinks\": [string]}}."
    )
}

pub fn critical_thinking_prompt(question: &str, context: &str) -> String {
    let q = sanitize_xml_input(question);
    let c = sanitize_xml_input(context);
    format!(
        "You are a professional analytical thinker tasked with conducting deep, critical \
         analysis of the following question.\n<QUESTION>\n{q}\n</QUESTION>\n\n\
         Context:\n<CONTEXT>\n{c}\n</CONTEXT>\n\n\
         Critique the findings from multiple perspectives: what is well supported, what is \
         speculative, what contradicts itself, and what an expert skeptic would challenge."
    )
}

pub fn section_classification_prompt(
    sections: &[(String, String)],
    result_summaries: &[(usize, String, String, String)],
) -> String {
    let mut sections_block = String::new();
    for (title, description) in sections {
        sections_block.push_str(&format!(
            "- {}: {}\n",
            sanitize_xml_input(title),
            sanitize_xml_input(description)
        ));
    }
    let mut results_block = String::new();
    for (index, query, goal, snippet) in result_summaries {
        results_block.push_str(&format!(
            "[{index}] query={} goal={} snippet={}\n",
            sanitize_xml_input(query),
            sanitize_xml_input(goal),
            sanitize_xml_input(snippet)
        ));
    }
    format!(
        "Report sections:\n{sections_block}\n\nSearch results:\n{results_block}\n\n\
         Classify each result index into every section it is relevant to. Respond as JSON: \
         {{\"mapping\": {{\"<section title>\": [index, ...]}}}}. A result may appear in \
         multiple sections."
    )
}

pub fn section_synthesis_prompt(
    section_title: &str,
    results_context: &str,
    references: &[research_core::Reference],
    language: Option<&str>,
) -> String {
    let title = sanitize_xml_input(section_title);
    let ctx = sanitize_xml_input(results_context);
    let mut refs_block = String::new();
    for r in references {
        refs_block.push_str(&format!("[{}] {} ({})\n", r.id, sanitize_xml_input(&r.title), r.url));
    }
    let lang = language
        .map(|l| format!("\n\nWrite the synthesis in: {l}"))
        .unwrap_or_default();
    format!(
        "Section: {title}\n\nResults:\n<RESULTS>\n{ctx}\n</RESULTS>\n\nReferences:\n{refs_block}{lang}\n\n\
         Produce a detailed synthesis for this section. Respond as JSON: {{\"synthesis\": string, \
         \"evidenceIndex\": [{{\"claim\", \"sourceIds\": [int], \"confidence\": \"low\"|\"medium\"|\"high\"}}], \
         \"keyDataPoints\": [string]}}."
    )
}

pub fn chart_planning_prompt(plan: &str, findings_summary: &str) -> String {
    let p = sanitize_xml_input(plan);
    let f = sanitize_xml_input(findings_summary);
    format!(
        "Report plan:\n<PLAN>\n{p}\n</PLAN>\n\nFindings:\n<FINDINGS>\n{f}\n</FINDINGS>\n\n\
         Propose up to 4 charts that would materially strengthen this report. Respond as a \
         JSON array of {{\"title\", \"chartType\": \"bar\"|\"line\"|\"pie\"|\"heatmap\"|\"scatter\"|\
         \"waterfall\"|\"radar\", \"dataDescription\", \"targetSection\", \"insight\"}}."
    )
}

const CJK_FONT_FALLBACK: &str =
    "['Noto Sans CJK SC', 'PingFang SC', 'Microsoft YaHei', 'SimHei', 'sans-serif']";

pub fn single_chart_code_prompt(spec: &research_core::ChartSpec) -> String {
    format!(
        "Write Python code to produce this chart:\nTitle: {}\nType: {:?}\nData: {}\nInsight to convey: {}\n\n\
         Rules:\n- Only use numpy, scipy, sympy, pandas, matplotlib, seaborn, plotly, sklearn\n\
         - No network access, no filesystem access\n\
         - Assign the final value to a variable named `result`\n\
         - Call plt.tight_layout() then plt.show() at the end\n\
         - Set matplotlib.rcParams['font.sans-serif'] = {CJK_FONT_FALLBACK} for CJK label support\n\
         - Respond with ONLY a single fenced ```python code block",
        sanitize_xml_input(&spec.title),
        spec.chart_type,
        sanitize_xml_input(&spec.data_description),
        sanitize_xml_input(&spec.insight),
    )
}

pub fn fix_analysis_code_prompt(code: &str, error: &str) -> String {
    let c = sanitize_xml_input(code);
    let e = sanitize_xml_input(error);
    format!(
        "The following Python code failed:\n```python\n{c}\n```\n\nError:\n<ERROR>\n{e}\n</ERROR>\n\n\
         Respond with a corrected, complete ```python code block obeying the same constraints \
         as before (allowed libraries only, no network/filesystem, `result` variable, \
         plt.tight_layout() then plt.show())."
    )
}

pub fn final_report_citation_image_prompt() -> &'static str {
    "Image Rules:\n\n\
     - Place images at the appropriate location in the article according to the image description.\n\
     - Include images using `![Image Description](image_url)` in a separate section.\n\
     - Do not add any images at the end of the article."
}

pub fn final_report_references_prompt() -> &'static str {
    "Citation Rules:\n\n\
     - Cite research references at the end of paragraphs when appropriate.\n\
     - Use the reference format [number] to reference sources in corresponding parts of your answer.\n\
     - If a paragraph draws on multiple sources, list all relevant citation numbers, e.g., [1][2]. \
     Control the number of footnotes.\n\
     - Do not have more than 3 reference links in a single paragraph; keep only the most relevant.\n\
     - Do not add references at the end of the report."
}

pub fn academic_report_prompt(
    plan: &str,
    context: &str,
    references_block: &str,
    requirement: &str,
    critical_analysis: Option<&str>,
    computational_summary: Option<&str>,
) -> String {
    let p = sanitize_xml_input(plan);
    let c = sanitize_xml_input(context);
    let refs = sanitize_xml_input(references_block);
    let req = sanitize_xml_input(requirement);
    let critical = critical_analysis
        .map(|s| format!("\n\nCritical analysis to incorporate:\n<CRITICAL>\n{}\n</CRITICAL>", sanitize_xml_input(s)))
        .unwrap_or_default();
    let computational = computational_summary
        .map(|s| format!("\n\nComputational findings to incorporate:\n<COMPUTATION>\n{}\n</COMPUTATION>", sanitize_xml_input(s)))
        .unwrap_or_default();

    format!(
        "This is the report plan:\n<PLAN>\n{p}\n</PLAN>\n\n\
         Structured research context:\n<CONTEXT>\n{c}\n</CONTEXT>\n\n\
         References available for citation:\n<SOURCES>\n{refs}\n</SOURCES>{critical}{computational}\n\n\
         Writing requirement, if any:\n<REQUIREMENT>\n{req}\n</REQUIREMENT>\n\n\
         Write a final research report. Requirements:\n\
         - MECE section structure with no overlapping sections\n\
         - Pyramid Principle: lead each section with its conclusion, then support it\n\
         - Claim-Evidence-Implication paragraph pattern throughout\n\
         - At least 3000 words\n\
         - At least 15 unique citations using [number] format, per the citation rules below\n\
         - 3-5 analytical tables using standard Markdown pipe-table syntax. Required types: \
         cross-tabulation matrix, comparative scoring matrix, decomposition waterfall, \
         risk-impact quadrant. Banned: feature lists, timeline-only tables, raw data dumps\n\
         - A forward-looking section covering 2-5 year implications\n\
         - Avoid vague phrases such as \"in today's world\", \"it is important to note\", \
         \"various factors\"\n\n\
         {citation_rules}\n\n{image_rules}\n\n{reference_rules}\n\n\
         Respond only with the final report content, no additional text before or after.",
        citation_rules = citation_rules(),
        image_rules = final_report_citation_image_prompt(),
        reference_rules = final_report_references_prompt(),
    )
}
