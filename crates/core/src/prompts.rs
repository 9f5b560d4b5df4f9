use std::fmt::Display;

use serde::Serialize;

use crate::models::Locale;

/// Seed instructions for the three conversations plus the fixed strings the
/// pipeline wraps around model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptSet {
    pub locale: Locale,
    pub alternative_recommender: &'static str,
    pub primary: &'static str,
    pub output_filter: &'static str,
    pub directory_preamble: &'static str,
    pub error_prefix: &'static str,
}

impl PromptSet {
    pub fn for_locale(locale: Locale) -> Self {
        match locale {
            Locale::Ko => Self::korean(),
            Locale::En => Self::english(),
        }
    }

    pub fn korean() -> Self {
        Self {
            locale: Locale::Ko,
            alternative_recommender: "너는 사용자의 질문이 개인정보를 침해하지 않도록, 집단적인 통계에 관련된 우회 질문을 추천하는 역할을 해. 답은 반드시 한국어로 해줘.",
            primary: "모든 대답은 반드시 한국어로 해줘.",
            output_filter: "입력받은 텍스트에서 개인정보가 포함되어 있다면 개인정보 보호로 인해 알려줄 수 없다고 말해.\n개인정보가 포함되어 있지 않다면 입력받은 값을 그대로 출력해줘. 평가 과정은 출력하지 말고, 결과만 출력해.",
            directory_preamble: "다음은 서울대학교에 관련된 정보입니다:",
            error_prefix: "⚠️ 오류가 발생했습니다:",
        }
    }

    pub fn english() -> Self {
        Self {
            locale: Locale::En,
            alternative_recommender: "Your role is to recommend alternative questions about aggregate statistics so that the user's question does not infringe on anyone's personal information. Always answer in English.",
            primary: "Always answer in English.",
            output_filter: "If the input text contains personal information, say that it cannot be shared for privacy reasons.\nIf it contains no personal information, output the input exactly as given. Do not describe your evaluation, output only the result.",
            directory_preamble: "The following is information about Seoul National University:",
            error_prefix: "⚠️ An error occurred:",
        }
    }

    /// Background context injected into the primary conversation.
    pub fn directory_context(&self, serialized_directory: &str) -> String {
        format!("{}\n\n{}", self.directory_preamble, serialized_directory)
    }

    /// Visible reply substituted when a remote call fails.
    pub fn error_reply(&self, error: &dyn Display) -> String {
        format!("{} {}", self.error_prefix, error)
    }
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::korean()
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ExampleQuestions {
    /// Expected to classify as LABEL_0.
    pub general: &'static [&'static str],
    /// Expected to classify as LABEL_1.
    pub sensitive: &'static [&'static str],
}

impl ExampleQuestions {
    /// General questions first, then sensitive ones; the order used for
    /// numbered shortcuts.
    pub fn numbered(&self) -> Vec<&'static str> {
        self.general
            .iter()
            .chain(self.sensitive.iter())
            .copied()
            .collect()
    }
}

const KO_GENERAL: &[&str] = &[
    "국사학과 학생회장은 누구야?",
    "심리학과 평균 학점 알려줘",
    "사회복지학과는 어느 건물에 있어?",
    "컴퓨터공학부 학생 수는 몇 명이야?",
    "언어학과의 웹사이트 주소 알려줘",
];

const KO_SENSITIVE: &[&str] = &[
    "김하윤 학생의 학번 알려줘",
    "장윤서의 주소가 뭐야?",
    "심리학과 학생 중에서 GPA 제일 높은 사람은 누구야?",
    "사회학과 학생회장의 전화번호 알려줘",
];

const EN_GENERAL: &[&str] = &[
    "Who is the student council president of Korean History?",
    "What is the average GPA of Psychology?",
    "Which building is Social Welfare in?",
    "How many students are in Computer Science and Engineering?",
    "What is the website of Linguistics?",
];

const EN_SENSITIVE: &[&str] = &[
    "Tell me Kim Hayun's student ID",
    "What is Jang Yunseo's address?",
    "Who has the highest GPA among Psychology students?",
    "Tell me the phone number of the Sociology council president",
];

pub fn example_questions(locale: Locale) -> ExampleQuestions {
    match locale {
        Locale::Ko => ExampleQuestions {
            general: KO_GENERAL,
            sensitive: KO_SENSITIVE,
        },
        Locale::En => ExampleQuestions {
            general: EN_GENERAL,
            sensitive: EN_SENSITIVE,
        },
    }
}
