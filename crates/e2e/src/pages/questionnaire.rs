//! Weight-loss onboarding questionnaire
//!
//! The survey is a long, frequently edited sequence of single-question
//! screens. Rather than scripting each screen, the page object looks at what
//! is on screen, answers it, and presses Continue until the plans page shows up.

use std::time::Duration;

use lumimeds_common::config::PLANS_PATH;
use lumimeds_common::{Address, TestIdentity};

use crate::context::TestContext;
use crate::error::{E2eError, E2eResult};

const STEP_LIMIT: usize = 40;
const STALL_LIMIT: usize = 3;
const SETTLE: Duration = Duration::from_millis(300);

const HEADING: &str = "h1, h2";
const CONTINUE: &[&str] = &[
    r#"button:has-text("Continue")"#,
    r#"button:has-text("Next")"#,
    r#"button:has-text("Continuar")"#,
    r#"button:has-text("Siguiente")"#,
    r#"button[type="submit"]"#,
];
const PREFERRED_OPTIONS: &[&str] = &[
    r#"label:has-text("None of the above")"#,
    r#"button:has-text("None of the above")"#,
    r#"label:has-text("Ninguna de las anteriores")"#,
    r#"label:has-text("No")"#,
    r#"button:has-text("No")"#,
];
const ANY_OPTION: &[&str] = &[
    r#"[role="radio"]"#,
    r#"label:has(input[type="radio"])"#,
    r#"[data-testid="survey-option"]"#,
];
const CONSENT: &str = r#"input[type="checkbox"]:not(:checked)"#;
const STATE_SELECT: &str = r#"select[name="state"]"#;

/// One kind of free-text question and where to find its input
struct Field {
    name: &'static str,
    selectors: &'static [&'static str],
}

const FIELDS: &[Field] = &[
    Field {
        name: "email",
        selectors: &[r#"input[type="email"]"#, r#"input[name="email"]"#],
    },
    Field {
        name: "first_name",
        selectors: &[r#"input[name="firstName"]"#, r#"input[name="first_name"]"#],
    },
    Field {
        name: "last_name",
        selectors: &[r#"input[name="lastName"]"#, r#"input[name="last_name"]"#],
    },
    Field {
        name: "dob",
        selectors: &[
            r#"input[name="dob"]"#,
            r#"input[name="dateOfBirth"]"#,
            r#"input[placeholder="MM/DD/YYYY"]"#,
        ],
    },
    Field {
        name: "phone",
        selectors: &[r#"input[type="tel"]"#, r#"input[name="phone"]"#],
    },
    Field {
        name: "height_feet",
        selectors: &[r#"input[name="feet"]"#, r#"input[name="heightFeet"]"#],
    },
    Field {
        name: "height_inches",
        selectors: &[r#"input[name="inches"]"#, r#"input[name="heightInches"]"#],
    },
    Field {
        name: "weight",
        selectors: &[r#"input[name="weight"]"#, r#"input[name="currentWeight"]"#],
    },
    Field {
        name: "goal_weight",
        selectors: &[r#"input[name="goalWeight"]"#, r#"input[name="targetWeight"]"#],
    },
    Field {
        name: "zip",
        selectors: &[r#"input[name="zip"]"#, r#"input[name="zipCode"]"#],
    },
];

/// Answers given to free-text questions
#[derive(Debug, Clone)]
pub struct QuestionnaireAnswers {
    pub identity: TestIdentity,
    pub state: String,
    pub zip: String,
    pub height_feet: u32,
    pub height_inches: u32,
    pub weight_lbs: u32,
    pub goal_weight_lbs: u32,
}

impl QuestionnaireAnswers {
    /// A BMI comfortably inside GLP-1 eligibility
    pub fn eligible(identity: TestIdentity, address: &Address) -> Self {
        Self {
            identity,
            state: address.state.clone(),
            zip: address.zip.clone(),
            height_feet: 5,
            height_inches: 6,
            weight_lbs: 210,
            goal_weight_lbs: 170,
        }
    }

    fn value_for(&self, field: &str) -> String {
        match field {
            "email" => self.identity.email.clone(),
            "first_name" => self.identity.first_name.clone(),
            "last_name" => self.identity.last_name.clone(),
            "dob" => self.identity.date_of_birth.clone(),
            "phone" => self.identity.phone.clone(),
            "height_feet" => self.height_feet.to_string(),
            "height_inches" => self.height_inches.to_string(),
            "weight" => self.weight_lbs.to_string(),
            "goal_weight" => self.goal_weight_lbs.to_string(),
            "zip" => self.zip.clone(),
            _ => String::new(),
        }
    }
}

/// Where the questionnaire ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionnaireResult {
    pub steps: usize,
    pub url: String,
}

pub struct QuestionnairePage<'a> {
    ctx: &'a mut TestContext,
}

impl<'a> QuestionnairePage<'a> {
    pub fn new(ctx: &'a mut TestContext) -> Self {
        Self { ctx }
    }

    /// Answer screens until the plans page is reached
    pub async fn complete(&mut self, answers: &QuestionnaireAnswers) -> E2eResult<QuestionnaireResult> {
        self.ctx.log(format!("Email: {}", answers.identity.email));
        let mut stalled = 0;

        for step in 0..STEP_LIMIT {
            let url = self.ctx.session.current_url().await?;
            if url.contains(PLANS_PATH) {
                self.ctx.log(format!("✓ Questionnaire finished after {} screens", step));
                return Ok(QuestionnaireResult { steps: step, url });
            }
            let heading = self.ctx.session.text(HEADING).await?;

            let answered = self.answer_screen(answers).await?;
            let advanced = self.ctx.session.click_first(CONTINUE).await?.is_some();
            if !answered && !advanced {
                self.ctx.log(format!("ℹ️ Nothing to answer on screen {} ({})", step + 1, url));
            }
            self.ctx.session.sleep(SETTLE).await?;

            let moved = self.ctx.session.current_url().await? != url
                || self.ctx.session.text(HEADING).await? != heading;
            if moved {
                stalled = 0;
            } else {
                stalled += 1;
                if stalled >= STALL_LIMIT {
                    let path = self.ctx.capture("questionnaire-stalled").await?;
                    return Err(E2eError::step(
                        "questionnaire",
                        format!(
                            "stuck on {} ({}), see {}",
                            url,
                            heading.unwrap_or_default(),
                            path.display()
                        ),
                    ));
                }
            }
        }

        Err(E2eError::step(
            "questionnaire",
            format!("plans page not reached after {} screens", STEP_LIMIT),
        ))
    }

    /// Fill whatever the current screen asks. Returns whether anything was answered.
    async fn answer_screen(&mut self, answers: &QuestionnaireAnswers) -> E2eResult<bool> {
        let mut answered = false;

        for field in FIELDS {
            let value = answers.value_for(field.name);
            if self.ctx.session.fill_first(field.selectors, &value).await?.is_some() {
                answered = true;
            }
        }

        if self.ctx.session.is_visible(STATE_SELECT).await? {
            let selected = self.ctx.session.select_option(STATE_SELECT, &answers.state).await;
            answered |= self.ctx.recover("State selection", selected).is_some();
        }

        if self.ctx.session.is_visible(CONSENT).await? {
            let checked = self.ctx.session.check(CONSENT).await;
            answered |= self.ctx.recover("Consent checkbox", checked).is_some();
        }

        if !answered {
            let option = match self.ctx.session.first_visible(PREFERRED_OPTIONS).await? {
                Some(option) => Some(option),
                None => self.ctx.session.first_visible(ANY_OPTION).await?,
            };
            if let Some(option) = option {
                self.ctx.session.click(&option).await?;
                answered = true;
            }
        }

        Ok(answered)
    }
}
