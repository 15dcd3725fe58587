//! The outbound used-car purchase script: schema, location graph,
//! normalization examples and transition policy.

use callscript_core::{
    control_fields, next_weekday, Bound, DialogueSchema, DialogueState, FieldDescriptor, FieldKind,
    FieldValue, SchemaError, EXIT_LOCATION,
};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::decision::{Decision, ScriptPolicy};
use crate::errors::ScriptDefinitionError;
use crate::intents::Intent;
use crate::normalize::NormalizationExamples;
use crate::script::{Script, ScriptLocation, USER_ANSWERED_THE_QUESTION};

pub const INTRODUCTION: &str = "introduction";
pub const CAR_INFORMATION_INIT: &str = "car_information_init";
pub const CAR_INFORMATION: &str = "car_information";
pub const FIND_USERS_CAR_PRICE_INIT: &str = "find_users_car_price_init";
pub const FIND_USERS_CAR_PRICE: &str = "find_users_car_price";
pub const PRICE_OFFER_INIT: &str = "price_offer_init";
pub const PRICE_OFFER: &str = "price_offer";
pub const SCHEDULE_INSPECTION_APPOINTMENT_INIT: &str = "schedule_inspection_appointment_init";
pub const SCHEDULE_INSPECTION_APPOINTMENT: &str = "schedule_inspection_appointment";
pub const CONFIRM_INSPECTION_APPOINTMENT_INIT: &str = "confirm_inspection_appointment_init";
pub const CONFIRM_INSPECTION_APPOINTMENT: &str = "confirm_inspection_appointment";
pub const GOOD_BYE_INIT: &str = "good_bye_init";
pub const GOOD_BYE: &str = "good_bye";

/// Car fields collected one by one at the car-information node, in the
/// order they are asked for.
pub const CAR_INFORMATION_FIELDS: [&str; 6] = [
    "car_model_name",
    "car_manufacture_year",
    "car_transmission",
    "car_body",
    "car_fuel",
    "car_mileage",
];

const GLOBAL_INPUT_STATES: [&str; 6] = [
    "current_date",
    "current_time",
    "user_first_name",
    "user_last_name",
    "user_salutation",
    "car_model_name",
];

const BRANCH_OPENS: (u32, u32) = (9, 0);
const BRANCH_CLOSES: (u32, u32) = (21, 0);

/// Full field schema of the outbound buy conversation.
pub fn outbound_buy_schema() -> Result<DialogueSchema, SchemaError> {
    let mut fields = control_fields();
    fields[0].default = Some(FieldValue::Text(INTRODUCTION.to_string()));
    fields.push(FieldDescriptor::new("template_property_name", FieldKind::Text).hidden());

    fields.push(
        FieldDescriptor::new("current_date", FieldKind::Date)
            .description("Current date.")
            .examples(vec![json!("2023-01-11"), json!("2024-10-27")]),
    );
    fields.push(
        FieldDescriptor::new("current_time", FieldKind::Time)
            .description("Current time.")
            .examples(vec![json!("11:15"), json!("09:30"), json!("21:00")]),
    );

    fields.push(
        FieldDescriptor::new("user_first_name", FieldKind::Text)
            .description("The first name of the user.")
            .examples(vec![json!("Michal"), json!("František")]),
    );
    fields.push(
        FieldDescriptor::new("user_last_name", FieldKind::Text)
            .description("The last name of the user.")
            .examples(vec![json!("Kovář"), json!("Novák")]),
    );
    fields.push(
        FieldDescriptor::new("user_salutation", FieldKind::Text)
            .description("How to call the user.")
            .examples(vec![json!("pane Potočka"), json!("paní Habrman")]),
    );

    fields.push(
        FieldDescriptor::new("car_model_name", FieldKind::Text)
            .description("The model name of the user's car.")
            .examples(vec![json!("Renault Megane"), json!("Škoda Superb")])
            .ask("Jaký je model vašeho auta?"),
    );
    fields.push(
        FieldDescriptor::new("car_manufacture_year", FieldKind::Integer)
            .description("The manufacturing year of the customer car.")
            .examples(vec![
                json!(2018),
                json!(2020),
                json!(2011),
                json!(2010),
                json!("90 osum"),
                json!("dva tisíce 6"),
                json!("2000 pět"),
                json!("2 22"),
                json!("dva tisíce patnáct"),
                json!("dva sedumnáct"),
            ])
            .bounds(Some(Bound::Inclusive(1886)), None)
            .ask("Jaký je rok výroby vašeho vozu?")
            .normalize(),
    );
    fields.push(
        FieldDescriptor::new("car_transmission", FieldKind::Enumeration)
            .description("The transmission type of the user's engine.")
            .enumeration(vec![json!("automat"), json!("manuál")])
            .ask("Jaký je typ převodovky vašeho vozu?"),
    );
    fields.push(
        FieldDescriptor::new("car_body", FieldKind::Enumeration)
            .description("The body type of the user's car.")
            .enumeration(vec![
                json!("sedan"),
                json!("hatchback"),
                json!("SUV"),
                json!("kombi"),
                json!("MPV"),
                json!("off road"),
                json!("kupé"),
                json!("kabriolet"),
                json!("pickup"),
            ])
            .ask("Jaký je typ karoserie vašeho vozu?"),
    );
    fields.push(
        FieldDescriptor::new("car_fuel", FieldKind::Enumeration)
            .description("The fuel type of the user's car.")
            .enumeration(vec![
                json!("benzín"),
                json!("diesel"),
                json!("LPG"),
                json!("CNG"),
                json!("hybrid"),
                json!("ethanol"),
                json!("elektro"),
            ])
            .examples(vec![
                json!("benzín"),
                json!("diesel"),
                json!("dýzl"),
                json!("nafta"),
                json!("naftový"),
                json!("lpg"),
                json!("cng"),
                json!("biolíh"),
                json!("hybrid"),
                json!("elektro"),
            ])
            .ask("Jaké pohonné palivo používá váš vůz?")
            .normalize(),
    );
    fields.push(
        FieldDescriptor::new("car_engine_power_kw", FieldKind::Integer)
            .description("The engine power of the user's car.")
            .examples(vec![json!(110), json!(160)])
            .bounds(Some(Bound::Exclusive(60)), Some(Bound::Exclusive(300)))
            .ask("Jaký je výkon motoru vašeho vozu v kilowatech?"),
    );
    fields.push(
        FieldDescriptor::new("car_mileage", FieldKind::Integer)
            .description("The mileage of the user's car (in kilometers).")
            .examples(vec![json!(40_000), json!(80_000), json!(250_000)])
            .bounds(Some(Bound::Inclusive(0)), Some(Bound::Exclusive(4_828_032)))
            .ask("Kolik má najeto váš vůz v kilometrech?")
            .normalize(),
    );

    fields.push(
        FieldDescriptor::new("users_car_price", FieldKind::Integer)
            .description("The price for which the user offers to sell their car.")
            .examples(vec![
                json!("třicet tisíc"),
                json!("dvěstě tisíc"),
                json!("stotisíc"),
                json!("stodvacet tisíc"),
                json!("150 tisíc"),
                json!("100 padesát tisíc"),
                json!("dvacet 1000"),
                json!("sto 1000"),
                json!("dvěstě 1000"),
                json!("40 pět tisíc"),
                json!("sto padesát"),
                json!("milión"),
                json!(200_000),
                json!(300_000),
            ])
            .bounds(Some(Bound::Exclusive(0)), Some(Bound::Exclusive(3_322_917_000)))
            .normalize(),
    );
    fields.push(
        FieldDescriptor::new("our_price_offer", FieldKind::Integer)
            .description("The price for which we offer to buy the user's car.")
            .bounds(Some(Bound::Exclusive(0)), Some(Bound::Exclusive(3_322_917_000))),
    );

    fields.push(
        FieldDescriptor::new("is_inspection_meeting_at_company_branch", FieldKind::Boolean)
            .default_value(FieldValue::Boolean(true)),
    );
    fields.push(
        FieldDescriptor::new("non_branch_inspection_meeting_address", FieldKind::Text)
            .examples(vec![
                json!("Líšnice 3, 252 10 Líšnice"),
                json!("B. Jelínka 40, 533 61 Choltice"),
            ])
            .ask("Kde byste se chtěl sejít?"),
    );
    fields.push(
        FieldDescriptor::new("inspection_appointment_date", FieldKind::Date)
            .description("The date of the scheduled appointment with the user.")
            .examples(vec![
                json!("dnes"),
                json!("zítra"),
                json!("pozítří"),
                json!("v pondělí"),
                json!("v pátek"),
                json!("druhého července"),
                json!("příští středu"),
                json!("2. 8."),
                json!("5. října"),
                json!("12. 3. 2023"),
            ])
            .normalize(),
    );
    fields.push(
        FieldDescriptor::new("inspection_appointment_time", FieldKind::Time)
            .description(
                "The time of the scheduled appointment with the user. Don't extract any value \
                 if the time is not specific (e.g. \"dopoledne\", \"večer\" or \"kolem oběda\").",
            )
            .examples(vec![
                json!("ve dvě"),
                json!("tak ve tři"),
                json!("ve 12"),
                json!("10 30"),
                json!("devět 30"),
                json!("v jedenáct 15"),
                json!("v půl jedenácté"),
                json!("půl deváté ráno"),
                json!("kolem devíti ráno"),
                json!("na pátou"),
                json!("na osmou večer"),
                json!("čtvrt na dvě"),
                json!("večer v sedum"),
            ])
            .paired_date_field("inspection_appointment_date")
            .normalize(),
    );
    fields.push(
        FieldDescriptor::new("branch_location", FieldKind::Text)
            .description("The branch location where the appointment with the customer is scheduled.")
            .examples(vec![json!("Praha"), json!("Brno"), json!("Ostrava")]),
    );
    fields.push(
        FieldDescriptor::new("users_obstacle", FieldKind::Text)
            .description("Obstacle mentioned by the user.")
            .examples(vec![json!("nemám čas"), json!("hlídám děti")]),
    );

    // carried over from the intake form, never asked for on the call
    fields.push(FieldDescriptor::new("car_mileage_range", FieldKind::Text));
    fields.push(FieldDescriptor::new("gender", FieldKind::Text));
    fields.push(FieldDescriptor::new("initial_message_outbound", FieldKind::Text));
    fields.push(FieldDescriptor::new("initial_message_NR_inbound", FieldKind::Text));
    fields.push(FieldDescriptor::new("gpt_make_fon", FieldKind::Text));
    fields.push(FieldDescriptor::new("gpt_model_fon", FieldKind::Text));

    let opens = NaiveTime::from_hms_opt(BRANCH_OPENS.0, BRANCH_OPENS.1, 0)
        .expect("valid opening time constant");
    let closes = NaiveTime::from_hms_opt(BRANCH_CLOSES.0, BRANCH_CLOSES.1, 0)
        .expect("valid closing time constant");
    Ok(DialogueSchema::new(fields)?
        .with_business_hours(opens, closes)
        .with_protected_fields(["current_date", "current_time", "our_price_offer"]))
}

fn locations() -> Vec<ScriptLocation> {
    vec![
        ScriptLocation::new(
            INTRODUCTION,
            "Your goal is to introduce and kindly ask customer to have a short call with you. \
             ALWAYS ONLY EXACTLY ASK THE SENTENCE IN PRINT FUNCTION and always wait for customer answer!!",
            "AAA AUTO platí nejvyšší výkupní ceny na trhu. Jako největší bazar prodáváme nejvíce aut. \
             Ale neakceptujeme každý vůz.",
            vec![
                Intent::literal(
                    "user_greeting",
                    ["s kým mluvím?", "Kdo volá?"],
                    "Dobrý den ještě jednou, {{ user_salutation }}. Pokud máte minutku, tak pojďme na to, ano?",
                ),
                Intent::literal(
                    "user_is_available_for_call",
                    ["Ano můžu", "Dobře teď můžu", "Dobrý den", "Ano", "Dobře no", "Tak jo"],
                    "Výborně, {{ user_salutation }}. Tak pojďme na to, ano?",
                ),
                Intent::literal(
                    "user_not_available_for_call",
                    ["Teď asi nemám čas.", "Nevim.", "Ne"],
                    "{{ user_salutation }}, je to opravdu jen minutka.",
                ),
                Intent::literal(
                    "user_is_very_negative",
                    ["Běžte do prdele", "Ne, s vama nechci nic řešit", "Neotravujte mě", "už nevolejte"],
                    "Omlouvám se, {{ user_salutation }}. Dobrá tedy, chápu, že své auto nechcete \
                     prodat k nám do bazaru, ale ale nechcete aspoň slyšet cenu jakou bychom vám nabídli?",
                ),
            ],
        ),
        ScriptLocation::print(
            CAR_INFORMATION_INIT,
            "Find out the specific missing car property {{ template_property_name }}. Never ask \
             for more parameters in a single sentence. Only ask about {{ template_property_name }}. \
             ALWAYS ONLY EXACTLY ASK THE SENTENCE IN PRINT FUNCTION and always wait for customer answer!!",
            "Abychom mohli auto nakoupit, potřebujeme znát všechny důležité informace pro odhad ceny.",
            "{{ template_property_ask }}",
        )
        .binding_template_property(),
        ScriptLocation::new(
            CAR_INFORMATION,
            "Find out the specific missing car property {{ template_property_name }} and then only say thanks.",
            "Abychom mohli auto nakoupit, potřebujeme znát všechny důležité informace pro odhad ceny.",
            vec![
                Intent::expanding(
                    USER_ANSWERED_THE_QUESTION,
                    [
                        "{{ template_property_example }}.",
                        "Je to {{ template_property_example }}.",
                        "Mám {{ template_property_example }}.",
                    ],
                    "Aha. Říkate { {{ template_property_name }} }. Děkuji.",
                ),
                Intent::literal(
                    "user_doesnt_know",
                    ["To nevím.", "To neznám", "Bohužel nevím", "A jaké jsou možnosti?", "Co by to mohlo být?"],
                    "Chápu, vaše auto může nejspíš být { give examples of \
                     {{ template_property_name }}: {{ template_property_choices }} } ?",
                ),
                Intent::literal(
                    "user_answer_unclear",
                    ["Tam nevim.", "Prosim co?", "Tamto je to.", "Uhuhu", "Ne ne ne"],
                    "Promiňte. Mohl by jste to upřesnit?",
                ),
            ],
        )
        .binding_template_property(),
        ScriptLocation::print(
            FIND_USERS_CAR_PRICE_INIT,
            "Zjistit cenovou představu zákaznika o jeho voze.",
            "Potřebujeme znát zákaznickou představu, abychom byli schopní udělat co nejlepší nabídku",
            "Teď bych se zeptala, {{ user_salutation }}, kolik za svůj vůj chcete? Pomůže mi to vám \
             dát nejlepší možnou nabídku.",
        ),
        ScriptLocation::new(
            FIND_USERS_CAR_PRICE,
            "Zjistit cenovou představu zákaznika.",
            "Chápu, {{ user_salutation }}, že neprodáváte vozy každý týden. Vy však své auto znáte \
             nejlépe a vaše cenová představa nám pomůže zpřesnit naši nabídku – díky tomu dostanete \
             přesnější cenu. Kdybyste si dával inzerát na internet, za jakou byste ho tam dal cenu?",
            vec![
                Intent::literal(
                    USER_ANSWERED_THE_QUESTION,
                    ["No asi tak dvestě tisíc", "milión", "šest set tisíc"],
                    "Aha. Říkáte { users_car_price }. Děkuji. Chcete tedy znát naši nabídku?",
                )
                .with_example_updates([
                    vec![("users_car_price", "200000")],
                    vec![("users_car_price", "1000000")],
                    vec![("users_car_price", "600000")],
                ]),
                Intent::literal(
                    "users_answer_unclear_or_rejected",
                    ["Teď nevim.", "To vám teď neřeknu.", "Neřeknu"],
                    "Chápu, {{ user_salutation }}, ale nebojte, je to nezávazné. Kolik by vám \
                     udělalo radost?",
                ),
                Intent::literal(
                    "users_answer_with_question_about_our_price_offer",
                    [
                        "Kolik by jste dali vy?",
                        "Řekněte mi první vaší nabídku",
                        "No a kolik mi date?",
                        "Řekněte vy první vaší nabídku",
                    ],
                    "{{ user_salutation | capitalize }}, chápu, ale než Vám řeknu naší nabídku, \
                     řekněte mi prosím, kolik by vám za vaše auto udělalo radost?",
                ),
            ],
        )
        .with_input_states(["users_car_price"]),
        ScriptLocation::print(
            PRICE_OFFER_INIT,
            "Prezentuj cenu auta {{ our_price_offer }} korun. ",
            "Já vám nabízím férovou cenu, slušné jednání a také to, že veškeré záruky za váš vůz \
             přebíráme my, zatímco při prodeji přes inzerát budete za vůz ručit vy. Průměrný počet \
             zájemců, kterým se budete muset věnovat, je asi 20. AAA má nejvyšší ceny, peníze \
             okamžitě, přebíráme záruky, vyřídíme administrativu, celostátní síť poboček, rychlé \
             jednání, bonus při protiúčtu.",
            "Cena je orientační, {{ user_salutation }}, protože vůz musíme vidět na pobočce. Běžná \
             výkupní cena je nižší, ale dnes bych vám mohla nabídnout až {{ our_price_offer }}, \
             protože teď takové vozy sháníme a platíme za ně víc. Je to pro vás zajímavé?",
        )
        .with_input_states(["our_price_offer"]),
        ScriptLocation::new(
            PRICE_OFFER,
            "Vyhodnoť jestli zákazník jasně souhlasí s cenou {{ our_price_offer }} Kč za auto.",
            "Já vám nabízím férovou cenu, slušné jednání a také to, že veškeré záruky za váš vůz \
             přebíráme my, zatímco při prodeji přes inzerát budete za vůz ručit vy. Průměrný počet \
             zájemců, kterým se budete muset věnovat, je asi 20. AAA má nejvyšší ceny, peníze \
             okamžitě, přebíráme záruky, vyřídíme administrativu, celostátní síť poboček, rychlé \
             jednání, bonus při protiúčtu.",
            vec![
                Intent::literal(
                    "user_accepts",
                    ["Ano", "Dobře", "To je v pořádku", "To je fajn"],
                    "Výborně, {{ user_salutation }}, takže domluvíme schůzku. Co na to říkáte?",
                ),
                Intent::literal(
                    "users_thinks_the_price_is_too_low",
                    ["To je málo.", "cena je příliš nízká"],
                    "Je mi jasné, že vaše představa je vyšší, {{ user_salutation }}. U nás ale máte \
                     záruku nejvyšší výkupní ceny díky velkému obratu nemusíme vydělávat na \
                     jednotlivém autě. Já vám nyní nabízím cenu vyšší právě proto, že vykupujeme \
                     vozy pro naši novou pobočku. Dostanete tak víc než kdy jindy a kdekoliv jinde, \
                     pojďme využít té šance a já vám zajistím přednostní jednání.",
                ),
                Intent::literal(
                    "user_wants_to_sell_alone",
                    ["prodám si vůz sám přes inzerát"],
                    "{{ user_salutation | capitalize }}, tomu rozumím. V inzerci se však do půl \
                     roku prodá jen pětina vozů. To znamená, že zbytečně budete trávit svůj čas \
                     projížďkou s lidmi, které vůbec neznáte a bez záruk. Můžeme se tedy domluvit \
                     na naší výkupní částce?",
                ),
                Intent::literal(
                    "users_saw_higher_prices_online",
                    ["na internetu se takové vozy nabízejí za vyšší částky"],
                    "To máte úplnou pravdu, skutečně se za vyšší částky nabízejí, ale neprodávají \
                     se. Auto ztrátí svou hodnotu  nakonec za něj dostanete méně než teď. Já vám \
                     nabízím okamžitou výplatu celé částky, je to férová cena. Můžeme se tedy \
                     domluvit na naší výkupní částce?",
                ),
            ],
        )
        .with_input_states(["our_price_offer"]),
        ScriptLocation::print(
            SCHEDULE_INSPECTION_APPOINTMENT_INIT,
            "Uzavři schůzku na nejbližší možný termín, nejlépe dnes na pobočce {{ branch_location }}",
            "Máme otevřeno od devíti do devíti každý den. Můžete přijít kdykoliv, ale nejlépe co \
             nejdříve do pár dní. Máme otevřeno i o víkendu. Máme pobočku otevřenou do devíti \
             hodin. Máte možnost se dříve uvolnit?",
            "Tak, a v kolik se dnes uvidíme? Můžete odpoledne nebo až večer?",
        )
        .with_input_states(["branch_location", "inspection_appointment_time", "inspection_appointment_date"]),
        ScriptLocation::new(
            SCHEDULE_INSPECTION_APPOINTMENT,
            "Uzavři schůzku na nejbližší možný termín, nejlépe dnes a za týden je pozdě. Ptej se \
             dokud není jasné datum a čas na pobočce {{ branch_location }}.",
            "Máme otevřeno od devíti do devíti každý den. Můžete přijít kdykoliv, ale nejlépe co \
             nejdříve do pár dní. Máme otevřeno i o víkendu. Máme pobočku otevřenou do devíti \
             hodin. Máte možnost se dříve uvolnit? Dnes je \
             {{ current_date | date_to_tts(today=current_date) }}. Teď je \
             {{ current_time | time_to_tts }}.",
            vec![
                Intent::literal(
                    "user_agreed_to_arrive_soon",
                    [
                        "Asi bych si to mohl zařídit a přijít v šest dnes.",
                        "Tak dobře, tedy zítra v 9",
                    ],
                    "Aha. Jsem moc ráda, že se nám takto podařilo vše domluvit.",
                )
                .with_example_updates([
                    vec![
                        ("inspection_appointment_time", "18:00"),
                        ("inspection_appointment_date", "{{ current_date }}"),
                    ],
                    vec![
                        ("inspection_appointment_time", "09:00"),
                        ("inspection_appointment_date", "{{ tomorrow }}"),
                    ],
                ]),
                Intent::literal(
                    "user_rejects_without_obstacle",
                    ["dnes nemůžu přijet", "tento týden to nepůjde"],
                    "Proč dnes nemůžete přijet?",
                ),
                Intent::literal(
                    "user_rejects_with_obstacle",
                    ["Nemám čas", "Jsem v práci", "hlídám děti"],
                    "Chápu, že {INSERT USERS_JUST_MENTIONED_OBSTACLE}. Ale co kdyby jste \
                     {INSERT ARGUMENTS_TO_REMOVE_OBSTACLE}, protože když přijdete dnes tak \
                     {INSERT ARGUMENTS_WHY_COME_TODAY}. Šlo by to ještě dnes?",
                ),
            ],
        )
        .with_input_states(["branch_location", "inspection_appointment_time", "inspection_appointment_date"]),
        ScriptLocation::print(
            CONFIRM_INSPECTION_APPOINTMENT_INIT,
            "Potvrdit, že zákazník přijde na schůzku v \
             {{ inspection_appointment_date | date_to_tts(today=current_date) }} v \
             {{ inspection_appointment_time | time_to_tts }} na pobočku { {{ branch_location }} } ",
            "Sebou si zakazník potřebuje: Povinné – OP, druhý doklad totožnosti, velký technický \
             průkaz, zelená karta od pojištění. Doporučené – servisní kniha, kompletní klíče, malý \
             technický průkaz. Pokud je v TP neukončený leasing, originál plné moci od leasing \
             společnosti.",
            "Počítám tedy s vámi že určitě přijedete \
             {{ inspection_appointment_date | date_to_tts(today=current_date) }} v \
             {{ inspection_appointment_time | time_to_tts }} na pobočku {{ branch_location }}, je \
             to tak?",
        )
        .with_input_states(["branch_location", "inspection_appointment_time", "inspection_appointment_date"]),
        ScriptLocation::new(
            CONFIRM_INSPECTION_APPOINTMENT,
            "Potvrdit, že zákazník přijde na schůzku v \
             {{ inspection_appointment_date | date_to_tts(today=current_date) }} v \
             {{ inspection_appointment_time | time_to_tts }} na pobočku \
             { {{ branch_location }} }. Dnes je {{ current_date }}. Teď je {{ current_time }}.",
            "Sebou si zakazník potřebuje: Povinné – OP, druhý doklad totožnosti, velký technický \
             průkaz, zelená karta od pojištění. Doporučené – servisní kniha, kompletní klíče, malý \
             technický průkaz. Pokud je v TP neukončený leasing, originál plné moci od leasing \
             společnosti.",
            vec![
                Intent::literal(
                    "user_accepts",
                    ["Ano", "Dobře", "To je v pořádku", "To je fajn"],
                    "Výborně, {{ user_salutation }}, takže domluvíme schůzku. Co na to říkáte?",
                ),
                Intent::literal(
                    "user_rejected_or_changes",
                    ["Nechci.", "Ne", "Spíše v devět."],
                    "Chápu, {{ user_salutation }}, tak se pojďme domluvit na jindy, ano?",
                ),
                Intent::literal(
                    "users_answer_unclear_or_rejected",
                    ["To vám teď neřeknu.", "Nevim ještě."],
                    "Chápu, {{ user_salutation }}, tak se pojďme domluvit na jindy, ano?",
                ),
            ],
        )
        .with_input_states(["branch_location", "inspection_appointment_time", "inspection_appointment_date"]),
        ScriptLocation::print(
            GOOD_BYE_INIT,
            "Potvrdit, že zákazník přijde na schůzku a vezme potřebné dokumenty.",
            "Povinné – OP, druhý doklad totožnosti, velký technický průkaz, zelená karta od \
             pojištění. Doporučené – servisní kniha, kompletní klíče, malý technický průkaz. Pokud \
             je v TP neukončený leasing, originál plné moci od leasing společnosti.",
            "Tak {{ inspection_appointment_date | date_to_tts(today=current_date) }} v \
             {{ inspection_appointment_time | time_to_tts }}. Vemte si určitě druhý doklad \
             totožnosti, velký technický průkaz, zelená karta od pojištění. Na to nezapomeňte, \
             prosím. A raději také servisní knihu, kompletní klíče, malý technický průkaz. Pokud \
             je v TP neukončený leasing, originál plné moci od leasing společnosti. Ano?",
        ),
        ScriptLocation::new(
            GOOD_BYE,
            "Potvrdit, že zákazník přijde na schůzku a vezme potřebné dokumenty.",
            "Povinné – OP, druhý doklad totožnosti, velký technický průkaz, zelená karta od \
             pojištění. Doporučené – servisní kniha, kompletní klíče, malý technický průkaz. Pokud \
             je v TP neukončený leasing, originál plné moci od leasing společnosti.",
            vec![
                Intent::literal(
                    "user_confirms",
                    ["Ano?", "Dobře"],
                    "Výborně, {{ user_salutation }}. Tak se uvidíme.",
                ),
                Intent::literal(
                    "users_answer_unclear_or_rejected",
                    ["Nevim.", "Ne"],
                    "Aha, takže zpět.",
                ),
            ],
        )
        .with_input_states(["branch_location", "inspection_appointment_time", "inspection_appointment_date"]),
    ]
}

/// Few-shot normalization sets for every field flagged in the schema.
/// The relative date and time entries are anchored to the conversation's
/// start, matching the context lines in the normalization prompt.
pub fn outbound_buy_normalization_examples(
    schema: &DialogueSchema,
    today: NaiveDate,
    now: NaiveTime,
) -> Result<Vec<NormalizationExamples>, ScriptDefinitionError> {
    let iso = |date: NaiveDate| date.format("%Y-%m-%d").to_string();
    let in_hours = |hours: i64| {
        (NaiveDateTime::new(today, now) + Duration::hours(hours)).format("%H:%M").to_string()
    };
    let pairs = |raw: &[(&str, String)]| -> Vec<(String, String)> {
        raw.iter().map(|(spoken, canonical)| (spoken.to_string(), canonical.clone())).collect()
    };

    Ok(vec![
        NormalizationExamples::from_schema(
            schema,
            "inspection_appointment_date",
            pairs(&[
                ("dnes", iso(today)),
                ("zítra", iso(today + Duration::days(1))),
                ("pozítří", iso(today + Duration::days(2))),
                ("v pondělí", iso(next_weekday(today, Weekday::Mon))),
                ("v pátek", iso(next_weekday(today, Weekday::Fri))),
            ]),
        )?,
        NormalizationExamples::from_schema(
            schema,
            "inspection_appointment_time",
            pairs(&[
                ("tak ve tři", "15:00".to_string()),
                ("kolem devíti ráno", "09:00".to_string()),
                ("na desátou", "10:00".to_string()),
                ("půl deváté ráno", "08:30".to_string()),
                ("v půl devátý večer", "20:30".to_string()),
                ("na půl jedenáctou dopoledne", "10:30".to_string()),
                ("čtvrt na dvě", "13:15".to_string()),
                ("třičtvrtě na pět", "16:45".to_string()),
                ("za hodinu", in_hours(1)),
                ("za dvě hodiny", in_hours(2)),
            ]),
        )?,
        NormalizationExamples::from_schema(
            schema,
            "users_car_price",
            pairs(&[
                ("třicet tisíc", "30000".to_string()),
                ("šedesát pět tisíc", "65000".to_string()),
                ("alespoň pade", "50000".to_string()),
                ("stotisíc", "100000".to_string()),
                ("stovku", "100000".to_string()),
                ("kilo", "100000".to_string()),
                ("litr", "1000".to_string()),
                ("stodvacet tisíc", "120000".to_string()),
                ("sto devadesát tisíc", "190000".to_string()),
                ("sto padesát sedum tisíc", "157000".to_string()),
                ("milión", "1000000".to_string()),
            ]),
        )?,
        NormalizationExamples::from_schema(
            schema,
            "car_manufacture_year",
            pairs(&[
                ("tenhle rok", format!("{}", chrono::Datelike::year(&today))),
                ("loni", format!("{}", chrono::Datelike::year(&today) - 1)),
                ("dvatisíce 3", "2003".to_string()),
                ("dva tisíce třináct", "2013".to_string()),
                ("dva osum", "2008".to_string()),
                ("dva patnáct", "2015".to_string()),
                ("dva devatenáct", "2019".to_string()),
                ("devadesát pět", "1995".to_string()),
                ("devadesát šest", "1996".to_string()),
                ("devatenáct", "2019".to_string()),
            ]),
        )?,
        NormalizationExamples::from_schema(
            schema,
            "car_mileage",
            pairs(&[
                ("třicet tisíc", "30000".to_string()),
                ("šedesát pět tisíc", "65000".to_string()),
                ("stotisíc", "100000".to_string()),
                ("stotisíc kilometrů", "100000".to_string()),
                ("stovku", "100000".to_string()),
                ("stodvacet", "120000".to_string()),
                ("stodvacet tisíc", "120000".to_string()),
                ("dvěstě tisíc", "200000".to_string()),
                ("200 tisíc", "200000".to_string()),
                ("sto padesát sedum tisíc", "157000".to_string()),
            ]),
        )?,
        NormalizationExamples::from_schema(
            schema,
            "car_fuel",
            pairs(&[
                ("nafta", "diesel".to_string()),
                ("dýzl", "diesel".to_string()),
                ("propan butan", "LPG".to_string()),
                ("autoplyn", "LPG".to_string()),
                ("zkapalněný ropný plyn", "LPG".to_string()),
                ("metan", "CNG".to_string()),
                ("zemní plyn", "CNG".to_string()),
                ("ztlačený zemní plyn", "CNG".to_string()),
                ("etanol", "ethanol".to_string()),
                ("biolíh", "ethanol".to_string()),
                ("bioetanol", "ethanol".to_string()),
                ("elektrický", "elektro".to_string()),
            ]),
        )?,
    ])
}

/// Assemble the full outbound buy script, with relative normalization
/// examples anchored to the given conversation start.
pub fn outbound_buy_script(
    today: NaiveDate,
    now: NaiveTime,
) -> Result<Script, ScriptDefinitionError> {
    let schema = outbound_buy_schema()?;
    let normalization_examples = outbound_buy_normalization_examples(&schema, today, now)?;
    Script::new(
        "Zákazník prodává ojetý vůz.",
        schema,
        GLOBAL_INPUT_STATES,
        locations(),
        normalization_examples,
    )
}

/// A fresh conversation state anchored to the call's start.
pub fn outbound_buy_state(schema: &DialogueSchema, today: NaiveDate, now: NaiveTime) -> DialogueState {
    let mut state = DialogueState::from_schema(schema);
    state.set("current_date", FieldValue::Date(today));
    state.set("current_time", FieldValue::Time(now));
    state
}

/// Intake-form record handed over by the dialer before the call.
#[derive(Clone, Debug, Deserialize)]
pub struct CustomerForm {
    pub make: String,
    pub model: String,
    pub branch: String,
    pub customer_name: String,
    pub customer_surname: String,
    pub salutation: String,
    pub gender: String,
    pub car_mileage: String,
    pub car_fuel: String,
    pub manufacture_year: String,
    pub customer_price: String,
    pub initial_message_outbound: String,
    #[serde(rename = "initial_message_NR_inbound")]
    pub initial_message_nr_inbound: String,
    pub gpt_make_fon: String,
    pub gpt_model_fon: String,
}

/// Seed a conversation state from the intake form. Unparseable numeric
/// fields are left unset and asked for on the call instead.
pub fn state_from_form(
    schema: &DialogueSchema,
    form: &CustomerForm,
    today: NaiveDate,
    now: NaiveTime,
) -> DialogueState {
    let mut state = outbound_buy_state(schema, today, now);

    state.set("car_model_name", FieldValue::Text(format!("{} {}", form.make, form.model)));
    state.set("branch_location", FieldValue::Text(form.branch.clone()));
    state.set("user_first_name", FieldValue::Text(form.customer_name.clone()));
    state.set("user_last_name", FieldValue::Text(form.customer_surname.clone()));
    state.set("user_salutation", FieldValue::Text(form.salutation.clone()));
    state.set("gender", FieldValue::Text(form.gender.clone()));

    state.set("car_mileage_range", FieldValue::Text(form.car_mileage.clone()));
    if !form.car_fuel.is_empty() {
        state.set("car_fuel", FieldValue::Text(form.car_fuel.clone()));
    }
    state.set(
        "initial_message_outbound",
        FieldValue::Text(form.initial_message_outbound.clone()),
    );
    state.set(
        "initial_message_NR_inbound",
        FieldValue::Text(form.initial_message_nr_inbound.clone()),
    );
    state.set("gpt_make_fon", FieldValue::Text(form.gpt_make_fon.clone()));
    state.set("gpt_model_fon", FieldValue::Text(form.gpt_model_fon.clone()));

    match form.manufacture_year.trim().parse::<i64>() {
        Ok(year) => state.set("car_manufacture_year", FieldValue::Integer(year)),
        Err(_) => warn!(value = %form.manufacture_year, "invalid manufacture year in form"),
    }
    if !form.customer_price.is_empty() {
        match form.customer_price.trim().parse::<i64>() {
            Ok(price) => state.set("users_car_price", FieldValue::Integer(price)),
            Err(_) => warn!(value = %form.customer_price, "invalid customer price in form"),
        }
    }

    state
}

/// Transition policy of the outbound buy script.
///
/// Runs after the update has been validated and committed; everything
/// it reads comes from the state. Unhandled branches stay put.
pub struct OutboundBuyPolicy;

impl OutboundBuyPolicy {
    fn first_missing_car_field(state: &DialogueState) -> Option<&'static str> {
        CAR_INFORMATION_FIELDS.iter().copied().find(|field| state.is_unset(field))
    }

    /// Rendered prompt of an init location, used as the forced utterance
    /// accompanying a transition. Render failures degrade to plain
    /// generation instead of aborting the turn.
    fn init_utterance(script: &Script, state: &DialogueState, location: &str) -> Option<String> {
        match script.forced_utterance(state, location) {
            Ok(utterance) => utterance,
            Err(error) => {
                warn!(%location, %error, "init utterance failed to render");
                None
            }
        }
    }

    fn ask_next_car_field(script: &Script, state: &mut DialogueState) -> Decision {
        let missing = match Self::first_missing_car_field(state) {
            Some(field) => field,
            None => {
                let decision = Decision::advance(FIND_USERS_CAR_PRICE);
                return match Self::init_utterance(script, state, FIND_USERS_CAR_PRICE_INIT) {
                    Some(utterance) => decision.with_utterance(utterance),
                    None => decision,
                };
            }
        };
        state.set_template_property(missing);
        let decision = Decision::advance(CAR_INFORMATION);
        match Self::init_utterance(script, state, CAR_INFORMATION_INIT) {
            Some(utterance) => decision.with_utterance(utterance),
            None => decision,
        }
    }

    fn recognized_at(script: &Script, location: &str, intent: &str) -> bool {
        script
            .location(location)
            .map(|location| location.intents.iter().any(|candidate| candidate.name == intent))
            .unwrap_or(false)
    }
}

impl ScriptPolicy for OutboundBuyPolicy {
    fn transition(&self, script: &Script, state: &mut DialogueState) -> Decision {
        let location = state.script_location().to_string();
        let intent = state.intent().unwrap_or_default().to_string();

        match location.as_str() {
            INTRODUCTION => match intent.as_str() {
                "user_greeting" | "user_is_available_for_call" => {
                    Self::ask_next_car_field(script, state)
                }
                _ if Self::recognized_at(script, INTRODUCTION, &intent) => {
                    Decision::advance(INTRODUCTION)
                }
                _ => Decision::stay(INTRODUCTION),
            },

            CAR_INFORMATION => match intent.as_str() {
                USER_ANSWERED_THE_QUESTION => {
                    let answered = state
                        .template_property()
                        .map(|bound| !state.is_unset(bound))
                        .unwrap_or(false);
                    if !answered {
                        let decision = Decision::stay(CAR_INFORMATION);
                        return match Self::init_utterance(script, state, CAR_INFORMATION_INIT) {
                            Some(utterance) => decision.with_utterance(utterance),
                            None => decision,
                        };
                    }
                    Self::ask_next_car_field(script, state)
                }
                "user_doesnt_know" | "user_answer_unclear" => Decision::advance(CAR_INFORMATION),
                _ if Self::recognized_at(script, CAR_INFORMATION, &intent) => {
                    Decision::advance(CAR_INFORMATION)
                }
                _ => {
                    let decision = Decision::stay(CAR_INFORMATION);
                    match Self::init_utterance(script, state, CAR_INFORMATION_INIT) {
                        Some(utterance) => decision.with_utterance(utterance),
                        None => decision,
                    }
                }
            },

            FIND_USERS_CAR_PRICE => match intent.as_str() {
                USER_ANSWERED_THE_QUESTION => {
                    let decision = Decision::advance(PRICE_OFFER);
                    match Self::init_utterance(script, state, PRICE_OFFER_INIT) {
                        Some(utterance) => decision.with_utterance(utterance),
                        None => decision,
                    }
                }
                _ if Self::recognized_at(script, FIND_USERS_CAR_PRICE, &intent) => {
                    Decision::advance(FIND_USERS_CAR_PRICE)
                }
                _ => Decision::stay(FIND_USERS_CAR_PRICE),
            },

            PRICE_OFFER => match intent.as_str() {
                "user_accepts" => {
                    let decision = Decision::advance(SCHEDULE_INSPECTION_APPOINTMENT);
                    match Self::init_utterance(script, state, SCHEDULE_INSPECTION_APPOINTMENT_INIT)
                    {
                        Some(utterance) => decision.with_utterance(utterance),
                        None => decision,
                    }
                }
                _ if Self::recognized_at(script, PRICE_OFFER, &intent) => {
                    Decision::advance(PRICE_OFFER)
                }
                _ => Decision::stay(PRICE_OFFER),
            },

            SCHEDULE_INSPECTION_APPOINTMENT => match intent.as_str() {
                "user_agreed_to_arrive_soon" => {
                    if state.is_unset("inspection_appointment_date") {
                        return Decision::say(
                            SCHEDULE_INSPECTION_APPOINTMENT,
                            "Ale chybí nám tu ještě datum. Kdy nejdříve by jste mohl?",
                        );
                    }
                    if state.is_unset("inspection_appointment_time") {
                        return Decision::say(
                            SCHEDULE_INSPECTION_APPOINTMENT,
                            "Ale chybí nám tu ještě čas. Kdy nejdříve by jste mohl?",
                        );
                    }
                    let decision = Decision::advance(CONFIRM_INSPECTION_APPOINTMENT);
                    match Self::init_utterance(script, state, CONFIRM_INSPECTION_APPOINTMENT_INIT)
                    {
                        Some(utterance) => decision.with_utterance(utterance),
                        None => decision,
                    }
                }
                _ if Self::recognized_at(script, SCHEDULE_INSPECTION_APPOINTMENT, &intent) => {
                    Decision::advance(SCHEDULE_INSPECTION_APPOINTMENT)
                }
                _ => Decision::stay(SCHEDULE_INSPECTION_APPOINTMENT),
            },

            CONFIRM_INSPECTION_APPOINTMENT => match intent.as_str() {
                "user_accepts" => {
                    let decision = Decision::advance(GOOD_BYE);
                    match Self::init_utterance(script, state, GOOD_BYE_INIT) {
                        Some(utterance) => decision.with_utterance(utterance),
                        None => decision,
                    }
                }
                "user_rejected_or_changes" | "users_answer_unclear_or_rejected" => {
                    state.clear("inspection_appointment_date");
                    state.clear("inspection_appointment_time");
                    let decision = Decision::advance(SCHEDULE_INSPECTION_APPOINTMENT);
                    match Self::init_utterance(script, state, SCHEDULE_INSPECTION_APPOINTMENT_INIT)
                    {
                        Some(utterance) => decision.with_utterance(utterance),
                        None => decision,
                    }
                }
                _ => {
                    let decision = Decision::stay(CONFIRM_INSPECTION_APPOINTMENT);
                    match Self::init_utterance(script, state, CONFIRM_INSPECTION_APPOINTMENT_INIT)
                    {
                        Some(utterance) => decision.with_utterance(utterance),
                        None => decision,
                    }
                }
            },

            GOOD_BYE => match intent.as_str() {
                "user_confirms" => {
                    info!("call reached its terminal location");
                    Decision::advance(EXIT_LOCATION)
                }
                _ if Self::recognized_at(script, GOOD_BYE, &intent) => Decision::advance(GOOD_BYE),
                _ => Decision::stay(GOOD_BYE),
            },

            other => Decision::stay(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use callscript_core::{DialogueState, FieldValue};
    use chrono::{NaiveDate, NaiveTime};
    use serde_json::{json, Value};

    use super::{
        outbound_buy_schema, outbound_buy_script, outbound_buy_state, state_from_form,
        CustomerForm, OutboundBuyPolicy, CAR_INFORMATION, CONFIRM_INSPECTION_APPOINTMENT,
        FIND_USERS_CAR_PRICE, GOOD_BYE, INTRODUCTION, PRICE_OFFER,
        SCHEDULE_INSPECTION_APPOINTMENT,
    };
    use crate::decision::decide;
    use crate::script::Script;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 25).unwrap()
    }

    fn now() -> NaiveTime {
        NaiveTime::from_hms_opt(14, 30, 0).unwrap()
    }

    fn script() -> Script {
        outbound_buy_script(today(), now()).expect("script definition is valid")
    }

    fn state(script: &Script) -> DialogueState {
        let mut state = outbound_buy_state(&script.schema, today(), now());
        state.set("user_salutation", FieldValue::Text("pane Nováku".to_string()));
        state.set("branch_location", FieldValue::Text("Praha".to_string()));
        state.set("our_price_offer", FieldValue::Integer(180_000));
        state
    }

    fn update(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(key, value)| (key.to_string(), value.clone())).collect()
    }

    #[test]
    fn available_caller_is_asked_for_the_first_missing_car_field() {
        let script = script();
        let mut state = state(&script);
        let decision = decide(
            &script,
            &OutboundBuyPolicy,
            &mut state,
            &update(&[("INTENT", json!("user_is_available_for_call"))]),
        );

        assert_eq!(state.script_location(), CAR_INFORMATION);
        assert_eq!(state.template_property(), Some("car_model_name"));
        assert_eq!(decision.forced_utterance.as_deref(), Some("Jaký je model vašeho auta?"));
    }

    #[test]
    fn caller_with_complete_car_data_skips_to_the_price_question() {
        let script = script();
        let mut state = state(&script);
        state.set("car_model_name", FieldValue::Text("Škoda Superb".to_string()));
        state.set("car_manufacture_year", FieldValue::Integer(2018));
        state.set("car_transmission", FieldValue::Text("automat".to_string()));
        state.set("car_body", FieldValue::Text("kombi".to_string()));
        state.set("car_fuel", FieldValue::Text("diesel".to_string()));
        state.set("car_mileage", FieldValue::Integer(120_000));

        let decision = decide(
            &script,
            &OutboundBuyPolicy,
            &mut state,
            &update(&[("INTENT", json!("user_greeting"))]),
        );

        assert_eq!(state.script_location(), FIND_USERS_CAR_PRICE);
        let utterance = decision.forced_utterance.expect("price question is forced");
        assert!(utterance.contains("pane Nováku"));
    }

    #[test]
    fn answered_car_field_moves_on_to_the_next_one() {
        let script = script();
        let mut state = state(&script);
        state.set("car_model_name", FieldValue::Text("Škoda Superb".to_string()));
        state.set_script_location(CAR_INFORMATION);
        state.set_template_property("car_manufacture_year");

        let decision = decide(
            &script,
            &OutboundBuyPolicy,
            &mut state,
            &update(&[
                ("INTENT", json!("user_answered_the_question")),
                ("car_manufacture_year", json!(2015)),
            ]),
        );

        assert_eq!(state.get("car_manufacture_year"), Some(&FieldValue::Integer(2015)));
        assert_eq!(state.script_location(), CAR_INFORMATION);
        assert_eq!(state.template_property(), Some("car_transmission"));
        assert_eq!(
            decision.forced_utterance.as_deref(),
            Some("Jaký je typ převodovky vašeho vozu?")
        );
    }

    #[test]
    fn unanswered_car_field_is_asked_again() {
        let script = script();
        let mut state = state(&script);
        state.set_script_location(CAR_INFORMATION);
        state.set_template_property("car_fuel");

        let decision = decide(
            &script,
            &OutboundBuyPolicy,
            &mut state,
            &update(&[("INTENT", json!("user_answered_the_question"))]),
        );

        assert!(decision.retry);
        assert_eq!(state.script_location(), CAR_INFORMATION);
        assert_eq!(
            decision.forced_utterance.as_deref(),
            Some("Jaké pohonné palivo používá váš vůz?")
        );
    }

    #[test]
    fn price_answer_advances_to_the_offer() {
        let script = script();
        let mut state = state(&script);
        state.set_script_location(FIND_USERS_CAR_PRICE);

        let decision = decide(
            &script,
            &OutboundBuyPolicy,
            &mut state,
            &update(&[
                ("INTENT", json!("user_answered_the_question")),
                ("users_car_price", json!(200_000)),
            ]),
        );

        assert_eq!(state.script_location(), PRICE_OFFER);
        assert_eq!(state.get("users_car_price"), Some(&FieldValue::Integer(200_000)));
        assert!(decision.forced_utterance.expect("offer is forced").contains("180000"));
    }

    #[test]
    fn accepted_offer_moves_to_scheduling() {
        let script = script();
        let mut state = state(&script);
        state.set_script_location(PRICE_OFFER);

        let decision = decide(
            &script,
            &OutboundBuyPolicy,
            &mut state,
            &update(&[("INTENT", json!("user_accepts"))]),
        );

        assert_eq!(state.script_location(), SCHEDULE_INSPECTION_APPOINTMENT);
        assert_eq!(
            decision.forced_utterance.as_deref(),
            Some("Tak, a v kolik se dnes uvidíme? Můžete odpoledne nebo až večer?")
        );
    }

    #[test]
    fn past_appointment_date_is_sent_to_normalization_before_any_transition() {
        let script = script();
        let mut state = state(&script);
        state.set_script_location(SCHEDULE_INSPECTION_APPOINTMENT);

        let decision = decide(
            &script,
            &OutboundBuyPolicy,
            &mut state,
            &update(&[
                ("INTENT", json!("user_agreed_to_arrive_soon")),
                ("inspection_appointment_date", json!("2024-10-20")),
            ]),
        );

        assert!(decision.normalize);
        assert_eq!(decision.fields_to_normalize, vec!["inspection_appointment_date"]);
        assert_eq!(state.script_location(), SCHEDULE_INSPECTION_APPOINTMENT);
        assert!(state.is_unset("inspection_appointment_date"));
        assert!(state.intent().is_none());
    }

    #[test]
    fn scheduling_asks_for_whichever_appointment_part_is_missing() {
        let script = script();
        let mut state = state(&script);
        state.set_script_location(SCHEDULE_INSPECTION_APPOINTMENT);

        let decision = decide(
            &script,
            &OutboundBuyPolicy,
            &mut state,
            &update(&[
                ("INTENT", json!("user_agreed_to_arrive_soon")),
                ("inspection_appointment_time", json!("18:00")),
            ]),
        );
        assert_eq!(state.script_location(), SCHEDULE_INSPECTION_APPOINTMENT);
        assert_eq!(
            decision.forced_utterance.as_deref(),
            Some("Ale chybí nám tu ještě datum. Kdy nejdříve by jste mohl?")
        );

        let decision = decide(
            &script,
            &OutboundBuyPolicy,
            &mut state,
            &update(&[
                ("INTENT", json!("user_agreed_to_arrive_soon")),
                ("inspection_appointment_date", json!("2024-10-26")),
            ]),
        );
        assert_eq!(state.script_location(), CONFIRM_INSPECTION_APPOINTMENT);
        let confirmation = decision.forced_utterance.expect("confirmation is forced");
        assert!(confirmation.contains("zítra"), "confirmation speaks the date: {confirmation}");
    }

    #[test]
    fn rejected_confirmation_clears_the_appointment_and_reschedules() {
        let script = script();
        let mut state = state(&script);
        state.set_script_location(CONFIRM_INSPECTION_APPOINTMENT);
        state.set(
            "inspection_appointment_date",
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 10, 26).unwrap()),
        );
        state.set(
            "inspection_appointment_time",
            FieldValue::Time(NaiveTime::from_hms_opt(18, 0, 0).unwrap()),
        );

        decide(
            &script,
            &OutboundBuyPolicy,
            &mut state,
            &update(&[("INTENT", json!("user_rejected_or_changes"))]),
        );

        assert_eq!(state.script_location(), SCHEDULE_INSPECTION_APPOINTMENT);
        assert!(state.is_unset("inspection_appointment_date"));
        assert!(state.is_unset("inspection_appointment_time"));
    }

    #[test]
    fn confirmed_goodbye_ends_the_call() {
        let script = script();
        let mut state = state(&script);
        state.set_script_location(GOOD_BYE);

        decide(
            &script,
            &OutboundBuyPolicy,
            &mut state,
            &update(&[("INTENT", json!("user_confirms"))]),
        );
        assert_eq!(state.script_location(), "EXIT");
    }

    #[test]
    fn unrecognized_intent_stays_put_everywhere() {
        let script = script();
        for location in [INTRODUCTION, FIND_USERS_CAR_PRICE, PRICE_OFFER, GOOD_BYE] {
            let mut state = state(&script);
            state.set_script_location(location);
            let before = state.clone();

            let decision = decide(
                &script,
                &OutboundBuyPolicy,
                &mut state,
                &update(&[("INTENT", json!("user_mumbles"))]),
            );

            assert!(decision.retry, "{location} must retry");
            assert_eq!(state.script_location(), location);
            let mut expected = before;
            expected.set("INTENT", FieldValue::Text("user_mumbles".to_string()));
            assert_eq!(state, expected, "{location} must not change any other field");
        }
    }

    #[test]
    fn normalization_prompt_lists_exactly_the_failing_fields() {
        let script = script();
        let state = state(&script);
        let prompt = script
            .render_normalization_prompt(
                &state,
                &["inspection_appointment_date".to_string(), "car_fuel".to_string()],
            )
            .expect("prompt renders");

        assert!(prompt.contains("dnes -> 2024-10-25"));
        assert!(prompt.contains("v pondělí -> 2024-10-28"));
        assert!(prompt.contains("nafta -> diesel"));
        assert!(!prompt.contains("users_car_price"));
        assert!(prompt.contains("The current date is 2024-10-25."));
    }

    #[test]
    fn extraction_schema_at_car_information_exposes_the_bound_field() {
        let script = script();
        let mut state = state(&script);
        state.set_script_location(CAR_INFORMATION);
        state.set_template_property("car_transmission");

        let (prompt, function) =
            script.render_extraction_prompt(&state).expect("extraction renders");
        assert!(function.property_names().contains(&"car_transmission"));
        assert!(!function.property_names().contains(&"users_car_price"));
        assert!(prompt.contains("Je to manuál."));
    }

    #[test]
    fn form_seeding_maps_and_skips_invalid_numbers() {
        let schema = outbound_buy_schema().expect("valid schema");
        let form = CustomerForm {
            make: "Škoda".to_string(),
            model: "Octavia".to_string(),
            branch: "Brno".to_string(),
            customer_name: "Petr".to_string(),
            customer_surname: "Novák".to_string(),
            salutation: "pane Nováku".to_string(),
            gender: "m".to_string(),
            car_mileage: "100-150 tis. km".to_string(),
            car_fuel: "diesel".to_string(),
            manufacture_year: "neznámý".to_string(),
            customer_price: "250000".to_string(),
            initial_message_outbound: String::new(),
            initial_message_nr_inbound: String::new(),
            gpt_make_fon: "škoda".to_string(),
            gpt_model_fon: "oktávie".to_string(),
        };

        let state = state_from_form(&schema, &form, today(), now());
        assert_eq!(
            state.get("car_model_name"),
            Some(&FieldValue::Text("Škoda Octavia".to_string()))
        );
        assert_eq!(state.get("branch_location"), Some(&FieldValue::Text("Brno".to_string())));
        assert!(state.is_unset("car_manufacture_year"));
        assert_eq!(state.get("users_car_price"), Some(&FieldValue::Integer(250_000)));
        assert_eq!(state.script_location(), INTRODUCTION);
    }
}
