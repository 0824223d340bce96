use std::ops::Range;

use super::fetch::SearchSpecs;

pub const COMPANY_BATCH_SIZE: usize = 10;

pub const DEFAULT_COMPANIES: [&str; 45] = [
    "Anduril",
    "Palantir",
    "CrowdStrike",
    "Palo Alto Networks",
    "Fortinet",
    "Splunk",
    "Elastic",
    "Cloudflare",
    "Zscaler",
    "SentinelOne",
    "Lockheed Martin",
    "Northrop Grumman",
    "Raytheon (RTX)",
    "Boeing",
    "BAE Systems",
    "L3Harris",
    "General Dynamics",
    "Leidos",
    "SAIC",
    "Booz Allen",
    "MITRE",
    "Peraton",
    "ManTech",
    "Parsons",
    "CACI",
    "Microsoft",
    "Google",
    "Amazon (AWS)",
    "Apple",
    "Meta",
    "Netflix",
    "Cisco",
    "IBM",
    "Oracle",
    "VMware",
    "BlueHalo",
    "Bluestaq",
    "True Anomaly",
    "Sierra Space",
    "Auria Space",
    "Delta Sands",
    "Pryon",
    "Trellix",
    "Mandiant",
    "Recorded Future",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptDraft {
    pub keywords: Vec<String>,
    pub locations: Vec<String>,
    pub companies: Vec<String>,
    pub selected: Vec<bool>,
    pub prompt: String,
}

impl PromptDraft {
    pub fn from_specs(specs: Option<&SearchSpecs>) -> Self {
        let companies = DEFAULT_COMPANIES
            .iter()
            .map(|name| name.to_string())
            .collect::<Vec<_>>();
        Self {
            keywords: specs.map(SearchSpecs::keywords).unwrap_or_default(),
            locations: specs.map(SearchSpecs::locations).unwrap_or_default(),
            selected: vec![false; companies.len()],
            companies,
            prompt: String::new(),
        }
    }

    pub fn selected_count(&self) -> usize {
        self.selected.iter().filter(|s| **s).count()
    }

    pub fn selected_companies(&self) -> Vec<String> {
        self.companies
            .iter()
            .zip(&self.selected)
            .filter(|(_, selected)| **selected)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn toggle(&mut self, idx: usize) {
        if let Some(flag) = self.selected.get_mut(idx) {
            *flag = !*flag;
        }
    }

    pub fn select_all(&mut self, value: bool) {
        self.selected.iter_mut().for_each(|flag| *flag = value);
    }

    pub fn generate(&mut self) -> &str {
        self.prompt = build_prompt(&self.keywords, &self.locations, &self.selected_companies());
        &self.prompt
    }
}

pub fn add_terms(list: &mut Vec<String>, text: &str) {
    for term in text.split(',') {
        let term = term.trim();
        if !term.is_empty() && !list.iter().any(|existing| existing == term) {
            list.push(term.to_string());
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompanyPicker {
    pub batch: usize,
    pub cursor: usize,
}

impl CompanyPicker {
    pub fn batch_count(total: usize) -> usize {
        total.div_ceil(COMPANY_BATCH_SIZE)
    }

    pub fn batch_range(&self, total: usize) -> Range<usize> {
        let start = (self.batch * COMPANY_BATCH_SIZE).min(total);
        let end = (start + COMPANY_BATCH_SIZE).min(total);
        start..end
    }

    pub fn move_down(&mut self, total: usize) {
        let range = self.batch_range(total);
        if self.cursor + 1 < range.end {
            self.cursor += 1;
        } else if self.batch + 1 < Self::batch_count(total) {
            self.batch += 1;
            self.cursor = self.batch * COMPANY_BATCH_SIZE;
        }
    }

    pub fn move_up(&mut self, total: usize) {
        let range = self.batch_range(total);
        if self.cursor > range.start {
            self.cursor -= 1;
        } else if self.batch > 0 {
            self.batch -= 1;
            self.cursor = self.batch_range(total).end.saturating_sub(1);
        }
    }

    pub fn next_batch(&mut self, total: usize) {
        if self.batch + 1 < Self::batch_count(total) {
            self.batch += 1;
            self.cursor = self.batch * COMPANY_BATCH_SIZE;
        }
    }

    pub fn prev_batch(&mut self) {
        if self.batch > 0 {
            self.batch -= 1;
            self.cursor = self.batch * COMPANY_BATCH_SIZE;
        }
    }

    /// Absolute index of the `digit`-th company on the page (0 means 10th).
    pub fn index_for_digit(&self, digit: u32, total: usize) -> Option<usize> {
        let position = if digit == 0 { 10 } else { digit as usize };
        let idx = self.batch_range(total).start + position - 1;
        (idx < self.batch_range(total).end).then_some(idx)
    }
}

pub fn build_prompt(keywords: &[String], locations: &[String], companies: &[String]) -> String {
    let mut parts = vec![
        "# Job URL Search Request".to_string(),
        String::new(),
        "Find job posting URLs matching my criteria. Return ONLY valid, working URLs to active job listings.".to_string(),
        String::new(),
        "## Search Criteria".to_string(),
        String::new(),
    ];

    if !keywords.is_empty() {
        parts.push(format!("**Keywords:** {}", keywords.join(", ")));
    }
    if !locations.is_empty() {
        parts.push(format!("**Locations:** {}", locations.join(", ")));
    }
    if !companies.is_empty() {
        parts.push(format!("**Target Companies:** {}", companies.join(", ")));
    }

    parts.extend(
        [
            "",
            "## Instructions",
            "",
            "1. Search for job postings matching the criteria above",
            "2. Find direct links to individual job postings (not search results pages)",
            "3. Prioritize jobs from company career pages, Greenhouse, Lever, Workday, and iCIMS",
            "4. Verify each URL points to an active job posting",
            "",
            "## Output Format",
            "",
            "Return URLs with work-type tags. Use this EXACT format:",
            "",
            "```",
            "[REMOTE] https://example.com/jobs/12345",
            "[HYBRID] https://company.greenhouse.io/jobs/67890",
            "[ON-SITE: Denver, CO] https://jobs.lever.co/company/abcdef",
            "[REMOTE] https://careers.company.com/jobs/99999",
            "```",
            "",
            "## Tag Definitions",
            "",
            "- `[REMOTE]` - Fully remote position",
            "- `[HYBRID]` - Mix of remote and on-site",
            "- `[ON-SITE: Location]` - Must work at specific location",
            "- If work type is unclear, use `[UNKNOWN]`",
            "",
            "## Requirements",
            "",
            "- Return 20-50 unique job URLs",
            "- Each URL must be a direct link to a specific job posting",
            "- URLs must start with https:// or http://",
            "- No duplicate URLs",
            "- No expired or closed job postings",
            "- No general career page URLs (must be specific job listings)",
            "",
            "## Example Valid URLs",
            "",
            "- `https://boards.greenhouse.io/company/jobs/123456`",
            "- `https://jobs.lever.co/company/abc-def-123`",
            "- `https://company.wd5.myworkdayjobs.com/careers/job/Location/Title_ID`",
            "- `https://careers.company.com/jobs/12345`",
            "",
            "Provide the tagged job URLs now, one per line.",
        ]
        .iter()
        .map(|line| line.to_string()),
    );

    parts.join("\n")
}
