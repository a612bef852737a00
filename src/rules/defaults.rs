//! Built-in rule tables for Chinese fiction

use super::{CaptureSlot, ExtractionRule, ProfessionRule, RelationRule, RuleSet, SlotAnchor};
use crate::model::{ExtractionMethod, RelationType};

const SURNAMES: &[&str] = &[
    "王", "李", "张", "刘", "陈", "杨", "黄", "赵", "周", "吴",
    "徐", "孙", "朱", "马", "胡", "郭", "林", "何", "高", "梁",
    "郑", "罗", "宋", "谢", "唐", "韩", "曹", "许", "邓", "萧",
    "冯", "曾", "程", "蔡", "彭", "潘", "袁", "于", "董", "余",
    "苏", "叶", "吕", "魏", "蒋", "田", "杜", "丁", "沈", "姜",
    "范", "江", "傅", "钟", "卢", "汪", "戴", "崔", "任", "陆",
    "廖", "姚", "方", "金", "邱", "夏", "谭", "韦", "贾", "邹",
    "石", "熊", "孟", "秦", "阎", "薛", "侯", "雷", "白", "龙",
    "段", "郝", "孔", "邵", "史", "毛", "常", "万", "顾", "赖",
    "武", "康", "贺", "严", "尹", "钱", "施", "牛", "洪", "龚",
    "莫", "欧", "司徒", "司马", "上官", "欧阳", "太史", "端木",
    "公孙", "轩辕", "令狐", "钟离", "宇文", "长孙", "慕容", "鲜于",
    "闾丘", "司空", "亓官", "司寇", "仉督", "子车", "颛孙",
];

/// Particles, pronouns, common verbs and action heads (点头, 皱眉, 转身)
/// that never continue a given name
const NAME_BOUNDARY_CHARS: &str = concat!(
    "的了着过是在和与跟同对向把被给让说道问笑喊叫看望听走跑来去到也都就又还才不没很便却而但",
    "一这那他她它我你您们吗呢吧啊呀么",
    "点皱转摇抬低站坐叹拍挥伸",
);

const HONORIFIC_SUFFIXES: &[&str] = &[
    "大哥", "大姐", "先生", "小姐", "公子", "大人", "夫人", "姑娘",
    "老师", "师父", "师兄", "师姐", "哥", "姐", "叔", "伯", "爷", "兄", "弟", "妹",
];

const DIMINUTIVE_PREFIXES: &[&str] = &["小", "老", "阿"];

const MASCULINE_MARKERS: &[&str] = &[
    "他", "先生", "公子", "少爷", "老爷", "父亲", "爸爸", "兄长", "大哥", "哥哥",
    "叔叔", "丈夫", "儿子", "男人", "少年", "小伙子", "男子",
];

const FEMININE_MARKERS: &[&str] = &[
    "她", "小姐", "姑娘", "夫人", "母亲", "妈妈", "姐姐", "妹妹", "妻子", "女儿",
    "女人", "少女", "女子", "阿姨",
];

const NEUTRAL_MARKERS: &[&str] = &["他们", "她们", "它们", "他人", "其他"];

const PROFESSIONS: &[(&str, &[&str])] = &[
    ("teacher", &["老师", "教师", "导师", "教授"]),
    ("student", &["学生", "同学", "学员"]),
    ("doctor", &["医生", "大夫", "郎中", "医师", "药师"]),
    ("mage", &["魔法师", "法师", "术士", "修士"]),
    ("soldier", &["将军", "士兵", "军官", "校尉", "侍卫"]),
    ("official", &["官员", "知府", "县令", "大臣", "丞相"]),
    ("merchant", &["商人", "掌柜", "老板", "店主"]),
    ("clergy", &["和尚", "道士", "僧人", "尼姑", "方丈"]),
    ("royalty", &["皇帝", "皇上", "陛下", "王爷", "公主", "太子"]),
    ("servant", &["丫鬟", "仆人", "管家", "侍女", "书童"]),
    ("police", &["警察", "捕快", "捕头"]),
];

// Speech verbs, longer compounds first so "点头道" is not read as part of a name
const SPEECH_VERBS: &str = "冷笑道|轻声道|低声道|大声道|开口道|点头道|摇头道|沉声道|淡淡道|微笑道|苦笑道|大笑道|说道|问道|笑道|喊道|叫道|答道|怒道|叹道|骂道|惊道|急道|说|道";

const KINSHIP: &str = "父亲|母亲|儿子|女儿|哥哥|弟弟|姐姐|妹妹|爷爷|奶奶|孙子|孙女|叔叔|伯伯|舅舅|姑姑|侄子|堂兄|表哥|表妹|亲人";
const KIN_PAIRS: &str = "亲兄弟|兄弟|姐妹|兄妹|姐弟|父子|母子|父女|母女|叔侄|祖孙|一家人";
const SOCIAL_TIES: &str = "朋友|好友|同学|同桌|室友|同事|师父|师傅|徒弟|弟子|老师|学生|手下|部下|属下|上司|搭档|队友|助手";
const SOCIAL_PAIRS: &str = "好朋友|朋友|好友|同学|同事|师徒|搭档|队友";
const HOSTILE_ACTS: &str = "打败了|击败了|杀死了|杀了|刺杀了|重创了|偷袭了|袭击了|打伤了|陷害了|背叛了|羞辱了";
const HOSTILE_TIES: &str = "敌人|仇人|死敌|对手|宿敌";
const HOSTILE_PAIRS: &str = "结仇|反目|为敌|有仇|交手|大打出手";
const ROMANTIC_TIES: &str = "妻子|丈夫|老婆|老公|女朋友|男朋友|女友|男友|未婚妻|未婚夫|恋人|情人|爱人";
const ROMANTIC_ACTS: &str = "爱上了|喜欢上了|暗恋着|暗恋|深爱着|爱慕着|亲吻了|吻了|娶了|嫁给了";
const ROMANTIC_PAIRS: &str = "恋人|夫妻|情侣|未婚夫妻";

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn extraction(method: ExtractionMethod, pattern: String) -> ExtractionRule {
    ExtractionRule { method, pattern, group: 1 }
}

/// `a` ends where its capture ends, `b` starts where its capture starts
fn relation(relation_type: RelationType, pattern: String) -> RelationRule {
    RelationRule {
        relation_type,
        pattern,
        first: CaptureSlot::new("a", SlotAnchor::End),
        second: CaptureSlot::new("b", SlotAnchor::Start),
    }
}

/// "A是B的<tie>"
fn tie_of(relation_type: RelationType, ties: &str) -> RelationRule {
    relation(
        relation_type,
        format!(r"(?P<a>\p{{Han}}{{2,6}})是(?P<b>\p{{Han}}{{2,6}}?)的(?:{ties})"),
    )
}

/// "A和B是<pair>"
fn pair_of(relation_type: RelationType, pairs: &str) -> RelationRule {
    relation(
        relation_type,
        format!(r"(?P<a>\p{{Han}}{{2,6}})(?:和|与|跟)(?P<b>\p{{Han}}{{2,6}}?)是(?:{pairs})"),
    )
}

/// "A<act>B"
fn act_on(relation_type: RelationType, acts: &str) -> RelationRule {
    relation(
        relation_type,
        format!(r"(?P<a>\p{{Han}}{{2,6}}?)(?:{acts})(?P<b>\p{{Han}}{{2,6}})"),
    )
}

pub(super) fn chinese() -> RuleSet {
    let honorifics = HONORIFIC_SUFFIXES.join("|");
    let diminutives = DIMINUTIVE_PREFIXES.join("|");

    let extraction_rules = vec![
        // "莫凡说道：" / "“……”莫凡笑道，"
        extraction(
            ExtractionMethod::Speaker,
            format!(r"(?:^|[^\p{{Han}}])(\p{{Han}}{{2,4}}?)(?:{SPEECH_VERBS})[：:，,“「]"),
        ),
        // "只听莫凡说道" / "说话的是莫凡。"
        extraction(
            ExtractionMethod::Speaker,
            format!(r"(?:只听|却听|便听|忽听|听见|说话的是|开口的是)(\p{{Han}}{{2,4}}?)(?:{SPEECH_VERBS}|[^\p{{Han}}]|$)"),
        ),
        // "“凡哥，" / "莫凡先生。"
        extraction(
            ExtractionMethod::Address,
            format!(r"(?:^|[^\p{{Han}}])(\p{{Han}}{{1,3}}?(?:{honorifics}))(?:[^\p{{Han}}]|$)"),
        ),
        // "“小凡，"
        extraction(
            ExtractionMethod::Address,
            format!(r"(?:^|[^\p{{Han}}])((?:{diminutives})\p{{Han}}{{1,2}})(?:[^\p{{Han}}]|$)"),
        ),
        // "，莫凡的妹妹"
        extraction(
            ExtractionMethod::Address,
            format!(r"(?:^|[^\p{{Han}}])(\p{{Han}}{{2,4}}?)的(?:{KINSHIP}|妻子|丈夫|师父|徒弟|朋友)"),
        ),
    ];

    let relation_rules = vec![
        tie_of(RelationType::Family, KINSHIP),
        pair_of(RelationType::Family, KIN_PAIRS),
        relation(
            RelationType::Family,
            format!(r"(?P<a>\p{{Han}}{{2,6}}?)的(?:{KINSHIP})(?P<b>\p{{Han}}{{2,6}})"),
        ),
        tie_of(RelationType::Social, SOCIAL_TIES),
        pair_of(RelationType::Social, SOCIAL_PAIRS),
        relation(
            RelationType::Social,
            r"(?P<a>\p{Han}{2,6})(?:拜|认)(?P<b>\p{Han}{2,6}?)为(?:师父|老师|大哥|义兄|师)".to_string(),
        ),
        act_on(RelationType::Antagonistic, HOSTILE_ACTS),
        tie_of(RelationType::Antagonistic, HOSTILE_TIES),
        relation(
            RelationType::Antagonistic,
            format!(r"(?P<a>\p{{Han}}{{2,6}})(?:和|与|跟)(?P<b>\p{{Han}}{{2,6}}?)(?:{HOSTILE_PAIRS})"),
        ),
        tie_of(RelationType::Romantic, ROMANTIC_TIES),
        act_on(RelationType::Romantic, ROMANTIC_ACTS),
        pair_of(RelationType::Romantic, ROMANTIC_PAIRS),
    ];

    RuleSet {
        surnames: strings(SURNAMES),
        name_boundary_chars: NAME_BOUNDARY_CHARS.to_string(),
        extraction_rules,
        honorific_suffixes: strings(HONORIFIC_SUFFIXES),
        diminutive_prefixes: strings(DIMINUTIVE_PREFIXES),
        relation_rules,
        masculine_markers: strings(MASCULINE_MARKERS),
        feminine_markers: strings(FEMININE_MARKERS),
        neutral_markers: strings(NEUTRAL_MARKERS),
        professions: PROFESSIONS
            .iter()
            .map(|(profession, markers)| ProfessionRule {
                profession: profession.to_string(),
                markers: strings(markers),
            })
            .collect(),
    }
}
